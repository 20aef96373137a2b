/*
 * Hit-testing: classify a window-local point into a chrome zone and translate
 * the result into the code vocabularies the native window managers expect.
 */

use crate::host::HostWindow;
use crate::types::{HitTestResult, Point, ResizeEdges, Size, SystemButtonType};

/*
 * Edges under `point` for a window of `size` with a resize band of `thickness`
 * pixels. In the top and bottom bands the corner zones reach twice as far
 * horizontally, so diagonal resizing is easier to grab.
 */
pub fn calculate_edges(size: Size, thickness: i32, point: Point) -> ResizeEdges {
    let mut edges = ResizeEdges::empty();
    if thickness <= 0 || size.is_empty() {
        return edges;
    }
    let (x, y) = (point.x, point.y);
    if x < 0 || y < 0 || x >= size.width || y >= size.height {
        return edges;
    }

    if y < thickness {
        edges |= ResizeEdges::TOP;
    } else if y >= size.height - thickness {
        edges |= ResizeEdges::BOTTOM;
    }

    let horizontal = if edges.is_empty() { thickness } else { thickness * 2 };
    if x < horizontal {
        edges |= ResizeEdges::LEFT;
    } else if x >= size.width - horizontal {
        edges |= ResizeEdges::RIGHT;
    }
    edges
}

/// Whether the host window currently accepts interactive resizing at all.
pub fn is_resizable(host: &dyn HostWindow) -> bool {
    !host.is_fixed_size() && !host.window_state().fills_monitor()
}

/*
 * Classifies `point` (window-local, physical pixels).
 *
 * Priority: system buttons, then the draggable caption, then resize edges,
 * then client content. The one exception is the top resize sliver: where it
 * overlaps the caption, resizing wins so the window stays resizable from its
 * top edge. Points the host reserves for interactive widgets inside the caption
 * are client content.
 */
pub fn classify(point: Point, host: &dyn HostWindow, border_thickness: i32) -> HitTestResult {
    if let Some(button) = host.is_inside_system_buttons(point) {
        return HitTestResult::SystemButton(button);
    }

    let edges = if is_resizable(host) {
        calculate_edges(host.size(), border_thickness, point)
    } else {
        ResizeEdges::empty()
    };

    if host.is_inside_title_bar_draggable_area(point) && !host.should_ignore_mouse_events(point) {
        if edges.contains(ResizeEdges::TOP) {
            return HitTestResult::ResizeEdges(edges);
        }
        return HitTestResult::CaptionDraggable;
    }

    if !edges.is_empty() {
        return HitTestResult::ResizeEdges(edges);
    }
    HitTestResult::ClientContent
}

/// Over the snap-layout helper only the buttons stay hit; the rest passes through.
pub fn classify_over_snap_helper(result: HitTestResult) -> HitTestResult {
    match result {
        HitTestResult::SystemButton(_) => result,
        _ => HitTestResult::Transparent,
    }
}

/// `WM_NCHITTEST` return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NativeHitCode {
    Transparent = -1,
    Nowhere = 0,
    Client = 1,
    Caption = 2,
    SysMenu = 3,
    MinButton = 8,
    MaxButton = 9,
    Left = 10,
    Right = 11,
    Top = 12,
    TopLeft = 13,
    TopRight = 14,
    Bottom = 15,
    BottomLeft = 16,
    BottomRight = 17,
    Close = 20,
    Help = 21,
}

impl NativeHitCode {
    pub const fn value(self) -> i32 {
        self as i32
    }

    pub fn from_edges(edges: ResizeEdges) -> Self {
        const MAP: [(ResizeEdges, NativeHitCode); 8] = [
            (ResizeEdges::TOP_LEFT, NativeHitCode::TopLeft),
            (ResizeEdges::TOP_RIGHT, NativeHitCode::TopRight),
            (ResizeEdges::BOTTOM_LEFT, NativeHitCode::BottomLeft),
            (ResizeEdges::BOTTOM_RIGHT, NativeHitCode::BottomRight),
            (ResizeEdges::LEFT, NativeHitCode::Left),
            (ResizeEdges::RIGHT, NativeHitCode::Right),
            (ResizeEdges::TOP, NativeHitCode::Top),
            (ResizeEdges::BOTTOM, NativeHitCode::Bottom),
        ];
        MAP.iter()
            .find(|(e, _)| *e == edges)
            .map_or(NativeHitCode::Client, |(_, code)| *code)
    }

    pub fn from_button(button: SystemButtonType) -> Self {
        match button {
            SystemButtonType::WindowIcon => NativeHitCode::SysMenu,
            SystemButtonType::Help => NativeHitCode::Help,
            SystemButtonType::Minimize => NativeHitCode::MinButton,
            SystemButtonType::Maximize | SystemButtonType::Restore => NativeHitCode::MaxButton,
            SystemButtonType::Close => NativeHitCode::Close,
        }
    }

    pub fn from_hit_result(result: HitTestResult) -> Self {
        match result {
            HitTestResult::ResizeEdges(edges) => Self::from_edges(edges),
            HitTestResult::SystemButton(button) => Self::from_button(button),
            HitTestResult::CaptionDraggable => NativeHitCode::Caption,
            HitTestResult::ClientContent => NativeHitCode::Client,
            HitTestResult::Transparent => NativeHitCode::Transparent,
        }
    }

    /// Recovers the caption button a non-client mouse message was sent for.
    pub fn system_button(value: i32, maximized: bool) -> Option<SystemButtonType> {
        let button = match value {
            v if v == NativeHitCode::SysMenu.value() => SystemButtonType::WindowIcon,
            v if v == NativeHitCode::Help.value() => SystemButtonType::Help,
            v if v == NativeHitCode::MinButton.value() => SystemButtonType::Minimize,
            v if v == NativeHitCode::MaxButton.value() && maximized => SystemButtonType::Restore,
            v if v == NativeHitCode::MaxButton.value() => SystemButtonType::Maximize,
            v if v == NativeHitCode::Close.value() => SystemButtonType::Close,
            _ => return None,
        };
        Some(button)
    }
}

/// `_NET_WM_MOVERESIZE` direction that starts a keyboard-less move.
pub const NET_WM_MOVERESIZE_MOVE: u32 = 8;

/// `_NET_WM_MOVERESIZE` direction for a resize from `edges`.
pub fn moveresize_direction(edges: ResizeEdges) -> Option<u32> {
    const DIRECTIONS: [(ResizeEdges, u32); 8] = [
        (ResizeEdges::TOP_LEFT, 0),
        (ResizeEdges::TOP, 1),
        (ResizeEdges::TOP_RIGHT, 2),
        (ResizeEdges::RIGHT, 3),
        (ResizeEdges::BOTTOM_RIGHT, 4),
        (ResizeEdges::BOTTOM, 5),
        (ResizeEdges::BOTTOM_LEFT, 6),
        (ResizeEdges::LEFT, 7),
    ];
    DIRECTIONS
        .iter()
        .find(|(e, _)| *e == edges)
        .map(|(_, direction)| *direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use crate::types::{Rect, WindowHandle, WindowState};

    const SIZE: Size = Size::new(800, 600);

    #[test]
    fn single_side_bands_yield_one_edge() {
        assert_eq!(calculate_edges(SIZE, 8, Point::new(3, 300)), ResizeEdges::LEFT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(796, 300)), ResizeEdges::RIGHT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(400, 2)), ResizeEdges::TOP);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(400, 599)), ResizeEdges::BOTTOM);
    }

    #[test]
    fn corner_bands_yield_two_edges() {
        assert_eq!(calculate_edges(SIZE, 8, Point::new(0, 0)), ResizeEdges::TOP_LEFT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(799, 0)), ResizeEdges::TOP_RIGHT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(5, 595)), ResizeEdges::BOTTOM_LEFT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(795, 595)), ResizeEdges::BOTTOM_RIGHT);
    }

    #[test]
    fn corners_are_twice_as_wide_in_top_and_bottom_bands() {
        // x = 12 lies outside the 8px side band but inside the doubled corner.
        assert_eq!(calculate_edges(SIZE, 8, Point::new(12, 3)), ResizeEdges::TOP_LEFT);
        assert_eq!(calculate_edges(SIZE, 8, Point::new(785, 597)), ResizeEdges::BOTTOM_RIGHT);
        // Not doubled away from the top and bottom bands.
        assert_eq!(calculate_edges(SIZE, 8, Point::new(12, 300)), ResizeEdges::empty());
        assert_eq!(calculate_edges(SIZE, 8, Point::new(16, 3)), ResizeEdges::TOP);
    }

    #[test]
    fn interior_and_outside_points_have_no_edges() {
        assert_eq!(calculate_edges(SIZE, 8, Point::new(400, 300)), ResizeEdges::empty());
        assert_eq!(calculate_edges(SIZE, 8, Point::new(-1, 300)), ResizeEdges::empty());
        assert_eq!(calculate_edges(SIZE, 8, Point::new(800, 300)), ResizeEdges::empty());
    }

    fn captioned_host() -> MockHost {
        MockHost::new(WindowHandle(1))
            .with_size(SIZE)
            .with_caption(Rect::new(0, 0, 800, 31))
            .with_button(SystemButtonType::Close, Rect::new(754, 0, 800, 31))
    }

    #[test]
    fn buttons_win_over_caption_and_edges() {
        let host = captioned_host();
        assert_eq!(
            classify(Point::new(799, 0), &host, 8),
            HitTestResult::SystemButton(SystemButtonType::Close)
        );
    }

    #[test]
    fn caption_wins_over_side_edges_but_not_the_top_sliver() {
        let host = captioned_host();
        assert_eq!(classify(Point::new(400, 20), &host, 8), HitTestResult::CaptionDraggable);
        assert_eq!(classify(Point::new(3, 20), &host, 8), HitTestResult::CaptionDraggable);
        assert_eq!(
            classify(Point::new(400, 3), &host, 8),
            HitTestResult::ResizeEdges(ResizeEdges::TOP)
        );
    }

    #[test]
    fn edges_win_over_client_content() {
        let host = captioned_host();
        assert_eq!(
            classify(Point::new(2, 300), &host, 8),
            HitTestResult::ResizeEdges(ResizeEdges::LEFT)
        );
        assert_eq!(classify(Point::new(400, 300), &host, 8), HitTestResult::ClientContent);
    }

    #[test]
    fn fixed_size_and_maximized_windows_have_no_edges() {
        let fixed = captioned_host().with_fixed_size(true);
        assert_eq!(classify(Point::new(400, 3), &fixed, 8), HitTestResult::CaptionDraggable);
        assert_eq!(classify(Point::new(2, 300), &fixed, 8), HitTestResult::ClientContent);

        let maximized = captioned_host().with_state(WindowState::Maximized);
        assert_eq!(classify(Point::new(2, 300), &maximized, 8), HitTestResult::ClientContent);
    }

    #[test]
    fn ignored_caption_points_are_client_content() {
        let host = captioned_host().with_ignored_area(Rect::new(100, 5, 200, 25));
        assert_eq!(classify(Point::new(150, 15), &host, 8), HitTestResult::ClientContent);
    }

    #[test]
    fn snap_helper_passes_everything_but_buttons_through() {
        assert_eq!(
            classify_over_snap_helper(HitTestResult::CaptionDraggable),
            HitTestResult::Transparent
        );
        let button = HitTestResult::SystemButton(SystemButtonType::Maximize);
        assert_eq!(classify_over_snap_helper(button), button);
    }

    #[test]
    fn native_codes_match_win32_values() {
        assert_eq!(NativeHitCode::from_hit_result(HitTestResult::Transparent).value(), -1);
        assert_eq!(NativeHitCode::from_hit_result(HitTestResult::CaptionDraggable).value(), 2);
        assert_eq!(
            NativeHitCode::from_hit_result(HitTestResult::ResizeEdges(ResizeEdges::BOTTOM_RIGHT)).value(),
            17
        );
        assert_eq!(
            NativeHitCode::from_hit_result(HitTestResult::SystemButton(SystemButtonType::Restore)).value(),
            9
        );
        assert_eq!(NativeHitCode::from_button(SystemButtonType::Close).value(), 20);
        assert_eq!(NativeHitCode::from_edges(ResizeEdges::empty()), NativeHitCode::Client);
    }

    #[test]
    fn native_button_codes_round_trip_with_window_state() {
        assert_eq!(NativeHitCode::system_button(9, true), Some(SystemButtonType::Restore));
        assert_eq!(NativeHitCode::system_button(9, false), Some(SystemButtonType::Maximize));
        assert_eq!(NativeHitCode::system_button(2, false), None);
    }

    #[test]
    fn moveresize_directions() {
        assert_eq!(moveresize_direction(ResizeEdges::TOP_LEFT), Some(0));
        assert_eq!(moveresize_direction(ResizeEdges::LEFT), Some(7));
        assert_eq!(moveresize_direction(ResizeEdges::empty()), None);
    }
}
