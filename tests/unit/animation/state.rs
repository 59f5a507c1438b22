use std::sync::Arc;

use super::*;
use crate::animation::ease::Ease;
use crate::animation::timeline::CameraMove;
use crate::foundation::core::{Rect, Size};
use crate::raster::buffer::Raster;
use crate::scene::layer::RasterRef;

fn action(id: &str, action_type: ActionType) -> Action {
    Action {
        layer_id: LayerId::new(id),
        action_type,
        start: 1.0,
        duration: 2.0,
        target: Point::new(100.0, 50.0),
        size: Size::new(200.0, 120.0),
        easing: None,
        origin: Some(Point::new(-600.0, 50.0)),
        brush_path: Some(BrushPath::Straight),
        brush_radius: None,
    }
}

#[test]
fn drag_is_hidden_off_canvas_before_start() {
    let s = action_state(&action("d", ActionType::DragDrop), 0.5);
    assert_eq!(s.phase, ActionPhase::Pending);
    assert_eq!(s.position, Point::new(-600.0, 50.0));
    assert_eq!(s.opacity, 0.0);
    assert!(!s.visible);
    assert!(s.brush.is_none());
}

#[test]
fn brush_and_background_wait_unrevealed() {
    let b = action_state(&action("b", ActionType::BrushReveal), 0.0);
    assert!(b.visible);
    assert_eq!(b.reveal_progress, 0.0);
    assert_eq!(b.position, Point::new(100.0, 50.0));

    let bg = action_state(&action("bg", ActionType::Background), 0.0);
    assert_eq!(bg.opacity, 0.0);
    assert_eq!(bg.reveal_progress, 0.0);
}

#[test]
fn drag_opacity_reaches_one_within_first_tenth() {
    let a = action("d", ActionType::DragDrop);
    assert_eq!(action_state(&a, 1.0).opacity, 0.0);
    assert!((action_state(&a, 1.1).opacity - 0.5).abs() < 1e-9);
    assert_eq!(action_state(&a, 1.25).opacity, 1.0);
    assert_eq!(action_state(&a, 2.0).opacity, 1.0);
}

#[test]
fn active_values_follow_easing() {
    let mut a = action("bg", ActionType::Background);
    a.easing = Some(Ease::Linear);
    let s = action_state(&a, 2.0);
    assert_eq!(s.phase, ActionPhase::Active);
    assert!((s.opacity - 0.5).abs() < 1e-12);

    let mut b = action("b", ActionType::BrushReveal);
    b.easing = Some(Ease::Linear);
    let s = action_state(&b, 1.5);
    assert!((s.reveal_progress - 0.25).abs() < 1e-12);
    assert!(s.is_revealing());
    let cursor = s.brush.unwrap().cursor;
    // Radius 40: cursor x runs from -40 to 240 in layer space, offset by the target.
    assert!((cursor.x - (100.0 - 40.0 + 0.25 * 280.0)).abs() < 1e-9);
    assert_eq!(cursor.y, 50.0 + 60.0);
}

#[test]
fn overshoot_moves_position_but_not_opacity_or_reveal() {
    let mut d = action("d", ActionType::DragDrop);
    d.easing = Some(Ease::out_back());
    d.origin = Some(Point::new(-600.0, 50.0));
    let max_x = (0..200)
        .map(|i| action_state(&d, 1.0 + f64::from(i) / 100.0).position.x)
        .fold(f64::MIN, f64::max);
    assert!(max_x > 100.0);

    let mut b = action("b", ActionType::BrushReveal);
    b.easing = Some(Ease::OutElastic);
    for i in 0..200 {
        let s = action_state(&b, 1.0 + f64::from(i) / 100.0);
        assert!((0.0..=1.0).contains(&s.reveal_progress));
        assert!((0.0..=1.0).contains(&s.opacity));
    }
}

#[test]
fn terminal_state_is_idempotent() {
    for ty in [
        ActionType::DragDrop,
        ActionType::BrushReveal,
        ActionType::Background,
    ] {
        let mut a = action("x", ty);
        a.easing = Some(Ease::OutElastic);
        let at_end = action_state(&a, 3.0);
        assert_eq!(at_end.phase, ActionPhase::Settled);
        assert_eq!(at_end.position, a.target);
        assert_eq!(at_end.opacity, 1.0);
        assert_eq!(at_end.reveal_progress, 1.0);
        for t in [3.5, 100.0, 1.0e9] {
            assert_eq!(action_state(&a, t), at_end, "{ty:?} at {t}");
        }
    }
}

#[test]
fn zero_duration_settles_immediately() {
    let mut a = action("bg", ActionType::Background);
    a.duration = 0.0;
    assert_eq!(action_state(&a, 0.999).phase, ActionPhase::Pending);
    assert_eq!(action_state(&a, 1.0).phase, ActionPhase::Settled);
}

#[test]
fn state_at_is_pure() {
    let tl = Timeline::new(
        vec![
            action("d", ActionType::DragDrop),
            {
                let mut b = action("b", ActionType::BrushReveal);
                b.start = 0.5;
                b
            },
        ],
        0.0,
    )
    .unwrap();
    let id = LayerId::new("d");
    for t in [0.0, 1.3, 2.7, 4.0] {
        assert_eq!(state_at(&tl, &id, t), state_at(&tl, &id, t));
    }
    assert!(state_at(&tl, &LayerId::new("nope"), 1.0).is_none());
}

fn layer(id: &str, rect: Rect) -> Layer {
    Layer::new(id, id, rect).with_raster(RasterRef::Memory(Arc::new(Raster::transparent(1, 1))))
}

#[test]
fn frame_states_cover_scene_and_camera() {
    let mut hidden = layer("h", Rect::new(0.0, 0.0, 10.0, 10.0));
    hidden.visible = false;
    let mut group = layer("g", Rect::new(0.0, 0.0, 10.0, 10.0));
    group.is_group = true;
    let world = World::new(
        Size::new(400.0, 300.0),
        vec![
            layer("d", Rect::new(100.0, 50.0, 300.0, 170.0)).with_z_index(1),
            layer("free", Rect::new(0.0, 0.0, 50.0, 50.0)).with_z_index(2),
            hidden.with_z_index(3),
            group.with_z_index(4),
        ],
    )
    .unwrap();
    let base = Camera::centered_on(world.size());
    let tl = Timeline::new(vec![action("d", ActionType::DragDrop)], 0.0)
        .unwrap()
        .with_camera_moves(vec![CameraMove {
            start: 0.0,
            duration: 1.0,
            to: Camera::new(Point::new(0.0, 0.0), 2.0),
            easing: Ease::Linear,
        }])
        .unwrap();

    let fs = frame_states(&world, &tl, base, 2.0);
    let ids: Vec<_> = fs.layers.iter().map(|s| s.layer_id.as_str()).collect();
    assert_eq!(ids, vec!["d", "free", "h"]);
    assert_eq!(fs.get(&LayerId::new("free")).unwrap().phase, ActionPhase::Static);
    assert!(!fs.get(&LayerId::new("h")).unwrap().visible);
    assert_eq!(fs.camera.zoom, 2.0);

    let a = frame_states(&world, &tl, base, 5.0);
    let b = frame_states(&world, &tl, base, 9.0);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), fs.fingerprint());
}
