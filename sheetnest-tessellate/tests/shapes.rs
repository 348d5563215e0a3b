use serde_json::json;
use sheetnest_core::{geometry::Point2, record::EntityRecord};
use sheetnest_tessellate::{TessellateError, UnitConversion, Units, tessellate_shape};

fn records(value: serde_json::Value) -> Vec<EntityRecord> {
    serde_json::from_value(value).expect("解析实体记录失败")
}

fn points(geometry: &sheetnest_core::shape::ShapeGeometry, index: usize) -> Vec<Point2> {
    let contour = geometry.contours()[index];
    geometry.contour_points(&contour).collect()
}

#[test]
fn plate_with_bolt_hole_yields_outer_and_inner_contours() {
    let records = records(json!([
        [[0, "LWPOLYLINE"], [90, "4"], [70, "1"],
         [10, "0"], [20, "0"], [10, "20"], [20, "0"],
         [10, "20"], [20, "10"], [10, "0"], [20, "10"]],
        [[0, "CIRCLE"], [10, "10"], [20, "5"], [40, "2"]]
    ]));

    let geometry = tessellate_shape(&records, UnitConversion::identity()).expect("细分失败");
    assert_eq!(geometry.contours().len(), 2);

    let outer = points(&geometry, 0);
    assert_eq!(outer.len(), 5);
    assert_eq!(outer.first(), outer.last());

    let hole = points(&geometry, 1);
    // round(2 * 360 * π / 180) = 13 段
    assert_eq!(hole.len(), 14);
    for point in &hole {
        let radius = point.distance(Point2::new(10.0, 5.0));
        assert!((radius - 2.0).abs() < 1e-9);
    }

    let size = geometry.size();
    assert!((size.x - 20.0).abs() < 1e-9);
    assert!((size.y - 10.0).abs() < 1e-9);
}

#[test]
fn spline_in_centimetres_is_sampled_in_millimetres() {
    let records = records(json!([
        [[0, "SPLINE"], [71, "1"], [72, "5"], [73, "3"],
         [40, "0"], [40, "0"], [40, "1"], [40, "2"], [40, "2"],
         [10, "0"], [20, "0"], [10, "1"], [20, "0"], [10, "1"], [20, "1"]]
    ]));
    let units = UnitConversion::from_units(Units::from_insunits(5));
    assert!((units.factor() - 10.0).abs() < 1e-12);

    let geometry = tessellate_shape(&records, units).expect("细分失败");
    let sampled = points(&geometry, 0);
    // 控制多边形弦长 20 mm → 20 段
    assert_eq!(sampled.len(), 21);
    let last = sampled.last().expect("末点");
    assert!((last.x() - 10.0).abs() < 1e-9);
    assert!((last.y() - 10.0).abs() < 1e-9);
    let middle = sampled[10];
    assert!((middle.x() - 10.0).abs() < 1e-9);
    assert!(middle.y().abs() < 1e-9);
}

#[test]
fn polyline_sequence_and_line_share_one_geometry() {
    let records = records(json!([
        [[0, "POLYLINE"], [70, "0"]],
        [[0, "VERTEX"], [10, "0"], [20, "0"]],
        [[0, "VERTEX"], [10, "3"], [20, "4"]],
        [[0, "SEQEND"]],
        [[0, "LINE"], [10, "3"], [20, "4"], [11, "6"], [21, "0"]]
    ]));

    let geometry = tessellate_shape(&records, UnitConversion::identity()).expect("细分失败");
    assert_eq!(geometry.contours().len(), 2);
    assert_eq!(geometry.vertices().len(), 4);
    assert_eq!(geometry.segments().count(), 2);
}

#[test]
fn any_unsupported_entity_rejects_the_whole_shape() {
    let records = records(json!([
        [[0, "LINE"], [10, "0"], [20, "0"], [11, "1"], [21, "1"]],
        [[0, "HATCH"], [10, "0"], [20, "0"]]
    ]));

    let err = tessellate_shape(&records, UnitConversion::identity()).unwrap_err();
    assert!(matches!(err, TessellateError::UnsupportedEntity { ref kind } if kind == "HATCH"));
    assert_eq!(err.to_string(), "unsupported geometry: entity HATCH");
}

#[test]
fn inconsistent_spline_counts_are_fatal() {
    let records = records(json!([
        [[0, "SPLINE"], [71, "2"], [72, "4"], [73, "3"],
         [40, "0"], [40, "0"], [40, "1"], [40, "1"],
         [10, "0"], [20, "0"], [10, "1"], [20, "1"], [10, "2"], [20, "0"]]
    ]));

    let err = tessellate_shape(&records, UnitConversion::identity()).unwrap_err();
    assert!(matches!(err, TessellateError::Spline(_)));
}
