/*
 * Chrome geometry: DPI-scaled frame metrics, client-rectangle negotiation,
 * frame margins and the window-relative arithmetic used while the engine moves
 * or resizes a window itself.
 *
 * Everything in here is a pure function of its inputs except `ChromeGeometry`,
 * which memoizes the metrics computed for each DPI it has seen.
 */

use crate::types::{Dpi, Margins, Point, Rect, ResizeEdges, Size, WindowState};

use parking_lot::Mutex;
use std::collections::HashMap;

/// `SM_CXSIZEFRAME` at 96 DPI.
pub const BASE_FRAME_SIZE: i32 = 4;
/// `SM_CXPADDEDBORDER` at 96 DPI.
pub const BASE_PADDED_BORDER: i32 = 4;
/// `SM_CYCAPTION` at 96 DPI.
pub const BASE_CAPTION_HEIGHT: i32 = 23;
pub const BASE_FRAME_BORDER: i32 = 1;
/// Strip kept free along an auto-hide taskbar so the taskbar can still be revealed.
pub const AUTO_HIDE_TASKBAR_THICKNESS: i32 = 2;
/// `SM_CXMINTRACK` x `SM_CYMINTRACK` at 96 DPI.
pub const BASE_MINIMUM_WINDOW_SIZE: Size = Size::new(136, 39);

pub fn scale_by_dpi(value: i32, dpi: u32) -> i32 {
    (f64::from(value) * f64::from(dpi) / f64::from(Dpi::BASE)).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemMetric {
    ResizeFrame,
    PaddedBorder,
    CaptionHeight,
}

/// Where DPI-aware system metrics come from. `None` means "use the scaled default".
pub trait MetricSource {
    fn system_metric(&self, metric: SystemMetric, dpi: u32) -> Option<i32>;
}

/// Scales the documented 96-DPI defaults; used when the OS has no per-DPI metric query.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMetrics;

impl MetricSource for DefaultMetrics {
    fn system_metric(&self, _metric: SystemMetric, _dpi: u32) -> Option<i32> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChromeMetrics {
    pub resize_border: i32,
    pub caption_height: i32,
    /// Caption plus the resize sliver above it.
    pub title_bar_height: i32,
    pub frame_border: i32,
}

impl ChromeMetrics {
    pub fn compute(dpi: Dpi, source: &dyn MetricSource) -> Self {
        let frame = source.system_metric(SystemMetric::ResizeFrame, dpi.y);
        let padded = source.system_metric(SystemMetric::PaddedBorder, dpi.y);
        let resize_border = match (frame, padded) {
            (Some(frame), Some(padded)) => frame + padded,
            _ => scale_by_dpi(BASE_FRAME_SIZE + BASE_PADDED_BORDER, dpi.y),
        };
        let caption_height = source
            .system_metric(SystemMetric::CaptionHeight, dpi.y)
            .unwrap_or_else(|| scale_by_dpi(BASE_CAPTION_HEIGHT, dpi.y));
        Self {
            resize_border,
            caption_height,
            title_bar_height: caption_height + resize_border,
            frame_border: scale_by_dpi(BASE_FRAME_BORDER, dpi.y).max(1),
        }
    }

    pub fn minimum_window_size(&self, dpi: Dpi) -> Size {
        Size::new(
            scale_by_dpi(BASE_MINIMUM_WINDOW_SIZE.width, dpi.x),
            scale_by_dpi(BASE_MINIMUM_WINDOW_SIZE.height, dpi.y),
        )
    }
}

/// Per-process DPI -> metrics table.
#[derive(Debug, Default)]
pub struct ChromeGeometry {
    table: Mutex<HashMap<Dpi, ChromeMetrics>>,
}

impl ChromeGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self, dpi: Dpi, source: &dyn MetricSource) -> ChromeMetrics {
        let dpi = if dpi.is_valid() { dpi } else { Dpi::DEFAULT };
        if let Some(metrics) = self.table.lock().get(&dpi) {
            return *metrics;
        }
        let metrics = ChromeMetrics::compute(dpi, source);
        log::debug!("Geometry: metrics for {} dpi: {metrics:?}", dpi.y);
        *self.table.lock().entry(dpi).or_insert(metrics)
    }

    pub fn resize_border_thickness(&self, dpi: Dpi, source: &dyn MetricSource) -> i32 {
        self.metrics(dpi, source).resize_border
    }

    pub fn caption_height(&self, dpi: Dpi, source: &dyn MetricSource) -> i32 {
        self.metrics(dpi, source).caption_height
    }

    pub fn title_bar_height(&self, dpi: Dpi, source: &dyn MetricSource) -> i32 {
        self.metrics(dpi, source).title_bar_height
    }

    pub fn frame_border_thickness(&self, dpi: Dpi, source: &dyn MetricSource) -> i32 {
        self.metrics(dpi, source).frame_border
    }
}

/*
 * Picks the DPI to use for a window. A direct per-window query wins; without
 * one the toolkit's device pixel ratio is applied to the 96 DPI reference, and
 * without a usable ratio the primary screen's DPI is taken.
 */
pub fn resolve_dpi(native: Option<Dpi>, device_pixel_ratio: f64, primary_screen: Option<Dpi>) -> Dpi {
    if let Some(dpi) = native.filter(Dpi::is_valid) {
        return dpi;
    }
    let primary = primary_screen.filter(Dpi::is_valid).unwrap_or(Dpi::DEFAULT);
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        let ratio_dpi = Dpi::uniform((f64::from(Dpi::BASE) * device_pixel_ratio).round() as u32);
        if ratio_dpi.is_valid() {
            return ratio_dpi;
        }
    }
    primary
}

/// Inputs for negotiating the client rectangle of a frameless window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAreaRequest {
    /// The window rectangle the OS proposes.
    pub proposed: Rect,
    /// The proposed rectangle after the OS applied its standard borders, when
    /// the frame border stays visible and the default handler was consulted.
    pub os_default: Option<Rect>,
    pub state: WindowState,
    pub frame_border_visible: bool,
    pub resize_border: i32,
    /// Monitor edges that carry an auto-hide taskbar.
    pub auto_hide_taskbar: ResizeEdges,
}

pub fn adjust_client_rect(request: &ClientAreaRequest) -> Rect {
    let mut client = match (request.frame_border_visible, request.os_default) {
        (true, Some(default)) => Rect {
            top: request.proposed.top,
            ..default
        },
        _ => request.proposed,
    };

    let border = request.resize_border;
    if request.state.is_maximized() {
        client.top += border;
        if !request.frame_border_visible {
            client.left += border;
            client.right -= border;
            client.bottom -= border;
        }
    }

    if request.state.fills_monitor() {
        let edges = request.auto_hide_taskbar;
        if edges.contains(ResizeEdges::TOP) {
            client.top += AUTO_HIDE_TASKBAR_THICKNESS;
        }
        if edges.contains(ResizeEdges::BOTTOM) {
            client.bottom -= AUTO_HIDE_TASKBAR_THICKNESS;
        }
        if edges.contains(ResizeEdges::LEFT) {
            client.left += AUTO_HIDE_TASKBAR_THICKNESS;
        }
        if edges.contains(ResizeEdges::RIGHT) {
            client.right -= AUTO_HIDE_TASKBAR_THICKNESS;
        }
    }
    client
}

/*
 * Margins the compositor frame is extended into the client area by. A 1px top
 * margin keeps the native shadow and snap preview. Backdrop materials need the
 * whole window as glass (-1).
 */
pub fn frame_margins(state: WindowState, backdrop_active: bool) -> Margins {
    if state.fills_monitor() {
        Margins::ZERO
    } else if backdrop_active {
        Margins::uniform(-1)
    } else {
        Margins {
            top: 1,
            ..Margins::ZERO
        }
    }
}

pub fn center_in_work_area(window: Size, work_area: Rect) -> Point {
    Point::new(
        work_area.left + (work_area.width() - window.width) / 2,
        work_area.top + (work_area.height() - window.height) / 2,
    )
}

/// Anchor for the system menu when it is opened from the keyboard.
pub fn keyboard_menu_anchor(window_origin: Point, title_bar_height: i32) -> Point {
    window_origin.offset(0, title_bar_height)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(ResizeEdges),
}

/// A move or resize the engine performs itself, anchored at the press position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub kind: DragKind,
    /// Pointer position in screen coordinates when the drag started.
    pub pointer_origin: Point,
    /// Window frame in screen coordinates when the drag started.
    pub window_origin: Rect,
}

impl DragSession {
    pub fn new(kind: DragKind, pointer_origin: Point, window_origin: Rect) -> Self {
        Self {
            kind,
            pointer_origin,
            window_origin,
        }
    }

    /// The window frame for the current pointer position.
    pub fn frame_at(&self, pointer: Point, minimum: Size) -> Rect {
        let dx = pointer.x - self.pointer_origin.x;
        let dy = pointer.y - self.pointer_origin.y;
        let start = self.window_origin;
        match self.kind {
            DragKind::Move => Rect::new(start.left + dx, start.top + dy, start.right + dx, start.bottom + dy),
            DragKind::Resize(edges) => {
                let mut frame = start;
                if edges.contains(ResizeEdges::LEFT) {
                    frame.left = (start.left + dx).min(start.right - minimum.width);
                }
                if edges.contains(ResizeEdges::RIGHT) {
                    frame.right = (start.right + dx).max(start.left + minimum.width);
                }
                if edges.contains(ResizeEdges::TOP) {
                    frame.top = (start.top + dy).min(start.bottom - minimum.height);
                }
                if edges.contains(ResizeEdges::BOTTOM) {
                    frame.bottom = (start.bottom + dy).max(start.top + minimum.height);
                }
                frame
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMetrics;

    impl MetricSource for FixedMetrics {
        fn system_metric(&self, metric: SystemMetric, dpi: u32) -> Option<i32> {
            match metric {
                SystemMetric::CaptionHeight => Some(if dpi >= 192 { 40 } else { 20 }),
                _ => None,
            }
        }
    }

    #[test]
    fn documented_metrics_at_100_and_200_percent() {
        let geometry = ChromeGeometry::new();

        let at_96 = geometry.metrics(Dpi::uniform(96), &DefaultMetrics);
        assert_eq!(at_96.resize_border, 8);
        assert_eq!(at_96.caption_height, 23);
        assert_eq!(at_96.title_bar_height, 31);
        assert_eq!(at_96.frame_border, 1);

        let at_192 = geometry.metrics(Dpi::uniform(192), &DefaultMetrics);
        assert_eq!(at_192.resize_border, 16);
        assert_eq!(at_192.title_bar_height, 62);
        assert_eq!(at_192.frame_border, 2);
    }

    #[test]
    fn resize_border_matches_rounded_formula_and_is_monotonic() {
        let mut previous = 0;
        for dpi in (48..=480).step_by(6) {
            let thickness = ChromeMetrics::compute(Dpi::uniform(dpi), &DefaultMetrics).resize_border;
            let expected = (8.0 * f64::from(dpi) / 96.0).round() as i32;
            assert_eq!(thickness, expected, "dpi {dpi}");
            assert!(thickness >= previous);
            previous = thickness;
        }
    }

    #[test]
    fn os_provided_metrics_win_over_defaults() {
        let metrics = ChromeMetrics::compute(Dpi::uniform(192), &FixedMetrics);
        assert_eq!(metrics.caption_height, 40);
        assert_eq!(metrics.title_bar_height, 56);
    }

    #[test]
    fn metrics_are_memoized_per_dpi() {
        let geometry = ChromeGeometry::new();
        let first = geometry.metrics(Dpi::uniform(144), &DefaultMetrics);
        // A different source no longer affects the cached entry.
        let second = geometry.metrics(Dpi::uniform(144), &FixedMetrics);
        assert_eq!(first, second);
    }

    #[test]
    fn dpi_resolution_falls_back_to_pixel_ratio() {
        assert_eq!(resolve_dpi(Some(Dpi::uniform(120)), 2.0, None), Dpi::uniform(120));
        assert_eq!(resolve_dpi(None, 1.5, None), Dpi::uniform(144));
        assert_eq!(resolve_dpi(None, f64::NAN, Some(Dpi::uniform(192))), Dpi::uniform(192));
        assert_eq!(resolve_dpi(Some(Dpi::uniform(0)), 0.0, None), Dpi::DEFAULT);
    }

    fn request(state: WindowState, frame_border_visible: bool) -> ClientAreaRequest {
        ClientAreaRequest {
            proposed: Rect::new(100, 100, 900, 700),
            os_default: Some(Rect::new(108, 131, 892, 692)),
            state,
            frame_border_visible,
            resize_border: 8,
            auto_hide_taskbar: ResizeEdges::empty(),
        }
    }

    #[test]
    fn hidden_frame_border_makes_the_whole_window_client_area() {
        let rect = adjust_client_rect(&request(WindowState::Normal, false));
        assert_eq!(rect, Rect::new(100, 100, 900, 700));
    }

    #[test]
    fn visible_frame_border_keeps_os_sides_and_restores_top() {
        let rect = adjust_client_rect(&request(WindowState::Normal, true));
        assert_eq!(rect, Rect::new(108, 100, 892, 692));
    }

    #[test]
    fn maximized_window_is_inset_by_the_resize_border() {
        let rect = adjust_client_rect(&request(WindowState::Maximized, false));
        assert_eq!(rect, Rect::new(108, 108, 892, 692));

        let rect = adjust_client_rect(&request(WindowState::Maximized, true));
        assert_eq!(rect, Rect::new(108, 108, 892, 692));
    }

    #[test]
    fn full_screen_is_not_inset_but_leaves_room_for_auto_hide_taskbar() {
        // Arrange
        let mut req = request(WindowState::FullScreen, false);
        req.auto_hide_taskbar = ResizeEdges::BOTTOM;

        // Act
        let rect = adjust_client_rect(&req);

        // Assert
        assert_eq!(rect, Rect::new(100, 100, 900, 698));
    }

    #[test]
    fn auto_hide_taskbar_is_ignored_for_normal_windows() {
        let mut req = request(WindowState::Normal, false);
        req.auto_hide_taskbar = ResizeEdges::LEFT;
        assert_eq!(adjust_client_rect(&req), req.proposed);
    }

    #[test]
    fn frame_margins_by_state() {
        assert_eq!(frame_margins(WindowState::Maximized, true), Margins::ZERO);
        assert_eq!(frame_margins(WindowState::Normal, true), Margins::uniform(-1));
        assert_eq!(
            frame_margins(WindowState::Normal, false),
            Margins {
                left: 0,
                top: 1,
                right: 0,
                bottom: 0
            }
        );
    }

    #[test]
    fn centering_respects_work_area_offset() {
        let work_area = Rect::new(0, 40, 1920, 1080);
        assert_eq!(
            center_in_work_area(Size::new(800, 600), work_area),
            Point::new(560, 260)
        );
    }

    #[test]
    fn move_session_translates_frame() {
        let session = DragSession::new(
            DragKind::Move,
            Point::new(50, 10),
            Rect::new(0, 0, 400, 300),
        );
        assert_eq!(
            session.frame_at(Point::new(80, 5), BASE_MINIMUM_WINDOW_SIZE),
            Rect::new(30, -5, 430, 295)
        );
    }

    #[test]
    fn resize_session_clamps_to_minimum_size() {
        let session = DragSession::new(
            DragKind::Resize(ResizeEdges::TOP_LEFT),
            Point::new(0, 0),
            Rect::new(0, 0, 400, 300),
        );

        let grown = session.frame_at(Point::new(-20, -10), BASE_MINIMUM_WINDOW_SIZE);
        assert_eq!(grown, Rect::new(-20, -10, 400, 300));

        let collapsed = session.frame_at(Point::new(1000, 1000), BASE_MINIMUM_WINDOW_SIZE);
        assert_eq!(collapsed, Rect::new(264, 261, 400, 300));
    }
}
