//! Checks on the static front end shipped in `assets/`

use london_housing::analytics::leaderboard;
use london_housing::Property;

const APP_JS: &str = include_str!("../assets/app.js");
const STYLE_CSS: &str = include_str!("../assets/css/style.css");

#[test]
fn test_leaderboard_delta_classes_are_styled() {
    let rows = [
        Property {
            full_address: "1 High St".into(),
            borough: Some("Camden".into()),
            sale_estimate_current_price: Some(900_000.0),
            ..Default::default()
        },
        Property {
            full_address: "2 High St".into(),
            borough: Some("Hackney".into()),
            sale_estimate_current_price: Some(300_000.0),
            ..Default::default()
        },
    ];
    let refs: Vec<&Property> = rows.iter().collect();
    let board = leaderboard(&refs);
    assert_eq!(board.len(), 2);

    for entry in &board {
        let selector = format!(".{} {{", entry.delta_class);
        assert!(STYLE_CSS.contains(&selector), "missing {selector}");
    }
}

#[test]
fn test_dataset_text_is_escaped_before_rendering() {
    let fields = [
        "full_address",
        "borough",
        "property_type",
        "label",
        "value",
        "badge",
        "delta_label",
        "price_label",
        "avg_price_label",
        "estimated_price_label",
    ];
    for row in ["p", "s", "e", "t"] {
        for field in fields {
            let raw = format!("${{{row}.{field}");
            assert!(!APP_JS.contains(&raw), "{raw} reaches innerHTML unescaped");
        }
    }
    assert!(APP_JS.contains("${esc(p.full_address)}"));
    assert!(APP_JS.contains("${esc(s.full_address)}"));
}
