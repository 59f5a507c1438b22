use super::*;

#[test]
fn zoom_is_clamped() {
    assert_eq!(Camera::new(Point::ZERO, 0.0).zoom, MIN_ZOOM);
    assert_eq!(Camera::new(Point::ZERO, 50.0).zoom, MAX_ZOOM);
    assert_eq!(Camera::new(Point::ZERO, f64::NAN).zoom, 1.0);
}

#[test]
fn centered_camera_maps_world_one_to_one() {
    let world = Size::new(1920.0, 1080.0);
    let vt = ViewTransform::new(Camera::centered_on(world), Viewport::FULL_HD, world).unwrap();
    assert_eq!(vt.world_to_viewport(Point::new(0.0, 0.0)), Point::new(0.0, 0.0));
    assert_eq!(
        vt.world_to_viewport(Point::new(100.0, 50.0)),
        Point::new(100.0, 50.0)
    );
}

#[test]
fn zoom_scales_around_camera_position() {
    let world = Size::new(1000.0, 1000.0);
    let cam = Camera::new(Point::new(500.0, 500.0), 2.0);
    let vt = ViewTransform::new(cam, Viewport::new(1000, 1000), world).unwrap();
    assert_eq!(vt.world_to_viewport(Point::new(500.0, 500.0)), Point::new(500.0, 500.0));
    assert_eq!(vt.world_to_viewport(Point::new(600.0, 500.0)), Point::new(700.0, 500.0));
}

#[test]
fn viewport_to_world_inverts_forward_mapping() {
    let world = Size::new(3000.0, 2000.0);
    let cam = Camera::new(Point::new(1200.0, 700.0), 1.5);
    let vt = ViewTransform::new(cam, Viewport::HD, world).unwrap();
    let p = Point::new(1234.5, 678.25);
    let back = vt.viewport_to_world(vt.world_to_viewport(p)).unwrap();
    assert!((back - p).hypot() < 1e-9);
}

#[test]
fn zero_world_is_rejected() {
    let cam = Camera::new(Point::ZERO, 1.0);
    assert!(ViewTransform::new(cam, Viewport::HD, Size::new(0.0, 10.0)).is_err());
}

#[test]
fn visible_rect_shrinks_with_zoom() {
    let world = Size::new(1000.0, 500.0);
    let r = Camera::new(Point::new(500.0, 250.0), 2.0).visible_rect(world);
    assert_eq!(r, Rect::new(250.0, 125.0, 750.0, 375.0));
}

#[test]
fn lerp_to_hits_both_ends() {
    let a = Camera::new(Point::new(0.0, 0.0), 1.0);
    let b = Camera::new(Point::new(100.0, 50.0), 3.0);
    assert_eq!(a.lerp_to(b, 0.0), a);
    assert_eq!(a.lerp_to(b, 1.0), b);
    assert_eq!(a.lerp_to(b, 0.5).zoom, 2.0);
}

#[test]
fn presets_resolve_by_name() {
    assert_eq!(Viewport::preset("1080p"), Some(Viewport::FULL_HD));
    assert_eq!(Viewport::preset("4K"), Some(Viewport::UHD_4K));
    assert_eq!(Viewport::preset("nope"), None);
    assert!(Viewport::new(0, 10).validate().is_err());
}
