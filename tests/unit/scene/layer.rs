use super::*;

#[test]
fn clean_name_strips_hint_prefix() {
    let l = Layer::new("a", "[BG] Sky", Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(l.clean_name(), "Sky");
    let l = Layer::new("b", "  [D]Logo", Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(l.clean_name(), "Logo");
    let l = Layer::new("c", "Plain", Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(l.clean_name(), "Plain");
}

#[test]
fn geometry_accessors_follow_bounds() {
    let l = Layer::new("a", "x", Rect::new(10.0, 20.0, 90.0, 620.0));
    assert_eq!(l.position(), Point::new(10.0, 20.0));
    assert_eq!(l.size(), Size::new(80.0, 600.0));
    assert_eq!(l.short_edge(), 80.0);
}

#[test]
fn hidden_and_group_layers_do_not_animate() {
    let base = Layer::new("a", "x", Rect::new(0.0, 0.0, 1.0, 1.0));
    assert!(base.is_animated());
    let mut hidden = base.clone();
    hidden.visible = false;
    assert!(!hidden.is_animated());
    let mut group = base;
    group.is_group = true;
    assert!(!group.is_animated());
}

#[test]
fn action_type_serializes_snake_case() {
    let s = serde_json::to_string(&ActionType::BrushReveal).unwrap();
    assert_eq!(s, "\"brush_reveal\"");
    assert_eq!(ActionType::DragDrop.as_str(), "drag_drop");
}
