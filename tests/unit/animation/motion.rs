use super::*;
use crate::animation::ease::Ease;
use crate::scene::layer::LayerId;

fn drag(origin: Point, target: Point) -> Action {
    Action {
        layer_id: LayerId::new("d"),
        action_type: ActionType::DragDrop,
        start: 1.0,
        duration: 2.0,
        target,
        size: Size::new(80.0, 80.0),
        easing: Some(Ease::OutCubic),
        origin: Some(origin),
        brush_path: None,
        brush_radius: None,
    }
}

#[test]
fn drag_path_hits_both_endpoints() {
    let a = drag(Point::new(-480.0, 100.0), Point::new(300.0, 100.0));
    assert_eq!(evaluate(&a, 0.0).point, Point::new(-480.0, 100.0));
    assert_eq!(evaluate(&a, 1.0).point, Point::new(300.0, 100.0));
    assert_eq!(evaluate(&a, 1.0).factor, 1.0);
}

#[test]
fn horizontal_drag_arcs_upwards() {
    let a = drag(Point::new(-480.0, 100.0), Point::new(300.0, 100.0));
    let mid = evaluate(&a, 0.5).point;
    assert!(mid.y < 100.0, "mid = {mid:?}");
}

#[test]
fn overshoot_carries_past_target() {
    let mut a = drag(Point::new(-480.0, 100.0), Point::new(300.0, 100.0));
    a.easing = Some(Ease::out_back());
    let max_x = (0..=100)
        .map(|i| evaluate(&a, f64::from(i) / 100.0).point.x)
        .fold(f64::MIN, f64::max);
    assert!(max_x > 300.0);
}

#[test]
fn velocity_is_zero_outside_motion() {
    let a = drag(Point::new(-480.0, 100.0), Point::new(300.0, 100.0));
    assert_eq!(velocity_at(&a, 0.0), Vec2::ZERO);
    assert_eq!(velocity_at(&a, 10.0), Vec2::ZERO);
    assert!(velocity_at(&a, 1.5).x > 0.0);
}

#[test]
fn origins_sit_outside_the_canvas() {
    let world = Size::new(1920.0, 1080.0);
    let size = Size::new(100.0, 50.0);
    let t = Point::new(10.0, 20.0);
    assert_eq!(drag_origin(t, size, world, EntrySide::Left), Point::new(-500.0, 20.0));
    assert_eq!(drag_origin(t, size, world, EntrySide::Right), Point::new(2320.0, 20.0));
    assert_eq!(drag_origin(t, size, world, EntrySide::Top), Point::new(10.0, -450.0));
    assert_eq!(drag_origin(t, size, world, EntrySide::Bottom), Point::new(10.0, 1480.0));
}

#[test]
fn nearest_side_is_deterministic() {
    let world = Size::new(1000.0, 1000.0);
    let size = Size::new(100.0, 100.0);
    assert_eq!(nearest_side(Point::new(0.0, 450.0), size, world), EntrySide::Left);
    assert_eq!(nearest_side(Point::new(900.0, 450.0), size, world), EntrySide::Right);
    assert_eq!(nearest_side(Point::new(450.0, 0.0), size, world), EntrySide::Top);
    assert_eq!(nearest_side(Point::new(450.0, 900.0), size, world), EntrySide::Bottom);
    // Dead centre ties everywhere.
    assert_eq!(nearest_side(Point::new(450.0, 450.0), size, world), EntrySide::Left);
}

#[test]
fn brush_cursor_sweeps_past_both_edges() {
    let size = Size::new(600.0, 300.0);
    let r = default_brush_radius(size);
    assert_eq!(r, 100.0);
    for path in [
        BrushPath::Straight,
        BrushPath::CurveDown,
        BrushPath::CurveUp,
        BrushPath::Zigzag,
        BrushPath::DiagonalDown,
        BrushPath::DiagonalUp,
    ] {
        let start = brush_cursor(size, 0.0, path, r);
        let end = brush_cursor(size, 1.0, path, r);
        assert_eq!(start.x, -100.0, "{path:?}");
        assert_eq!(end.x, 700.0, "{path:?}");
        for i in 0..=20 {
            let y = brush_cursor(size, f64::from(i) / 20.0, path, r).y;
            assert!((0.0..=300.0).contains(&y), "{path:?} y = {y}");
        }
    }
}

#[test]
fn brush_paths_have_their_shape() {
    let size = Size::new(600.0, 300.0);
    let r = 50.0;
    assert_eq!(brush_cursor(size, 0.5, BrushPath::Straight, r).y, 150.0);
    assert!(brush_cursor(size, 0.5, BrushPath::CurveDown, r).y > 150.0);
    assert!(brush_cursor(size, 0.5, BrushPath::CurveUp, r).y < 150.0);
    assert!(
        brush_cursor(size, 0.0, BrushPath::DiagonalDown, r).y
            < brush_cursor(size, 1.0, BrushPath::DiagonalDown, r).y
    );
    // Zigzag peaks at 1/6, 1/2 and 5/6.
    let peak = brush_cursor(size, 1.0 / 6.0, BrushPath::Zigzag, r).y;
    assert!((peak - (150.0 + 0.35 * 300.0)).abs() < 1e-9);
}

#[test]
fn small_layers_get_the_minimum_radius() {
    assert_eq!(default_brush_radius(Size::new(50.0, 30.0)), MIN_BRUSH_RADIUS);
}

#[test]
fn camera_follows_moves_in_order() {
    let base = Camera::new(Point::new(0.0, 0.0), 1.0);
    let moves = [
        CameraMove {
            start: 1.0,
            duration: 1.0,
            to: Camera::new(Point::new(100.0, 0.0), 2.0),
            easing: Ease::Linear,
        },
        CameraMove {
            start: 3.0,
            duration: 0.0,
            to: Camera::new(Point::new(0.0, 50.0), 1.0),
            easing: Ease::Linear,
        },
    ];
    assert_eq!(camera_at(base, &moves, 0.5), base);
    let mid = camera_at(base, &moves, 1.5);
    assert!((mid.position.x - 50.0).abs() < 1e-9);
    assert!((mid.zoom - 1.5).abs() < 1e-9);
    assert_eq!(camera_at(base, &moves, 2.5), moves[0].to);
    assert_eq!(camera_at(base, &moves, 3.0), moves[1].to);
}
