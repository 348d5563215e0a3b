use std::collections::VecDeque;

use glam::DVec2;
use sheetnest_core::geometry::Point2;
use sheetnest_core::shape::ShapeGeometry;
use tracing::debug;

use crate::grid::OccupancyGrid;

/// 把形状轮廓栅格化并按间距膨胀，得到用于碰撞检测的占位图。
///
/// 流程：轮廓描线 → 自边界的 4 连通洪水填充标记外部 → 对非外部（实体）区域做方形膨胀。
/// 封闭孔洞不会被标记为外部，因此膨胀不会渗入孔洞。
#[derive(Debug, Clone, Copy)]
pub struct HitmapBuilder {
    scale: f64,
    mirrored: bool,
    spacing: usize,
}

impl HitmapBuilder {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            mirrored: false,
            spacing: 0,
        }
    }

    /// 关于水平轴翻转：栅格行序倒置，即 `y' = ceil(高度 * scale) - y`。
    pub fn mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    pub fn spacing(mut self, spacing: usize) -> Self {
        self.spacing = spacing;
        self
    }

    /// 栅格尺寸：`ceil(尺寸 * scale) + 1`。
    pub fn grid_size(&self, geometry: &ShapeGeometry) -> (usize, usize) {
        let size = geometry.size() * self.scale;
        (
            size.x.max(0.0).ceil() as usize + 1,
            size.y.max(0.0).ceil() as usize + 1,
        )
    }

    /// 只描出轮廓线，相邻标记格保持 8 连通。镜像直接倒置栅格行序，
    /// 与排样时 `Orientation::Mirrored` 的逐行倒读完全一致。
    pub fn rasterize(&self, geometry: &ShapeGeometry) -> OccupancyGrid {
        let (width, height) = self.grid_size(geometry);
        let mut grid = OccupancyGrid::new(width, height);
        let bounds = geometry.bounds();
        if bounds.is_empty() {
            return grid;
        }
        let origin = bounds.min().as_vec2();
        let to_cell = |point: Point2| (point.as_vec2() - origin) * self.scale;

        for (start, end) in geometry.segments() {
            draw_segment(&mut grid, to_cell(start), to_cell(end));
        }
        if self.mirrored {
            grid.flipped_rows()
        } else {
            grid
        }
    }

    pub fn build(&self, geometry: &ShapeGeometry) -> OccupancyGrid {
        let outline = self.rasterize(geometry);
        let solid = flood_outside(&outline).inverted();
        let footprint = dilate(&solid, self.spacing);
        debug!(
            width = footprint.width(),
            height = footprint.height(),
            spacing = self.spacing,
            mirrored = self.mirrored,
            "生成占位图"
        );
        footprint
    }
}

/// 沿主轴以单格步长行进，标记经过的每个格子。
fn draw_segment(grid: &mut OccupancyGrid, start: DVec2, end: DVec2) {
    let delta = end - start;
    let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as usize;
    let max_x = grid.width().saturating_sub(1) as f64;
    let max_y = grid.height().saturating_sub(1) as f64;
    for i in 0..=steps {
        let point = start + delta * (i as f64 / steps as f64);
        let x = point.x.round().clamp(0.0, max_x) as usize;
        let y = point.y.round().clamp(0.0, max_y) as usize;
        grid.set(x, y, true);
    }
}

/// 从所有边界格出发，在非轮廓格上做 4 连通广度优先填充；返回的栅格中 `true` 表示外部。
pub fn flood_outside(outline: &OccupancyGrid) -> OccupancyGrid {
    let (width, height) = (outline.width(), outline.height());
    let mut outside = OccupancyGrid::new(width, height);
    let mut queue = VecDeque::new();

    let visit =
        |x: usize, y: usize, outside: &mut OccupancyGrid, queue: &mut VecDeque<(usize, usize)>| {
            if !outline.get(x, y) && !outside.get(x, y) && outside.set(x, y, true) {
                queue.push_back((x, y));
            }
        };

    for x in 0..width {
        visit(x, 0, &mut outside, &mut queue);
        visit(x, height.saturating_sub(1), &mut outside, &mut queue);
    }
    for y in 0..height {
        visit(0, y, &mut outside, &mut queue);
        visit(width.saturating_sub(1), y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            visit(x - 1, y, &mut outside, &mut queue);
        }
        if y > 0 {
            visit(x, y - 1, &mut outside, &mut queue);
        }
        visit(x + 1, y, &mut outside, &mut queue);
        visit(x, y + 1, &mut outside, &mut queue);
    }
    outside
}

/// 以 `(2 * spacing + 1)` 的方形结构元膨胀，输出尺寸四周各扩 `spacing` 格。
/// 方形可分解为先水平后垂直两次一维膨胀。
pub fn dilate(solid: &OccupancyGrid, spacing: usize) -> OccupancyGrid {
    let reach = 2 * spacing;
    let width = solid.width() + reach;
    let height = solid.height() + reach;

    let mut horizontal = OccupancyGrid::new(width, solid.height());
    for y in 0..solid.height() {
        for (x, cell) in solid.row(y).iter().enumerate() {
            if *cell {
                for dx in 0..=reach {
                    horizontal.set(x + dx, y, true);
                }
            }
        }
    }

    let mut padded = OccupancyGrid::new(width, height);
    for y in 0..horizontal.height() {
        for (x, cell) in horizontal.row(y).iter().enumerate() {
            if *cell {
                for dy in 0..=reach {
                    padded.set(x, y + dy, true);
                }
            }
        }
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(geometry: &mut ShapeGeometry, x0: f64, y0: f64, x1: f64, y1: f64) {
        geometry.push_contour([
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
            Point2::new(x0, y0),
        ]);
    }

    #[test]
    fn convex_shape_matches_declared_size() {
        let mut geometry = ShapeGeometry::new();
        rectangle(&mut geometry, 0.0, 0.0, 10.0, 6.0);
        let footprint = HitmapBuilder::new(1.0).build(&geometry);

        let (x0, y0, x1, y1) = footprint.occupied_bounds().expect("occupied");
        let width = (x1 - x0 + 1) as i64;
        let height = (y1 - y0 + 1) as i64;
        assert!((width - 10).abs() <= 1, "width {width}");
        assert!((height - 6).abs() <= 1, "height {height}");
        // 实心矩形：内部全部占用
        assert_eq!(footprint.count_occupied(), 11 * 7);
    }

    #[test]
    fn steep_and_shallow_segments_have_no_gaps() {
        let mut geometry = ShapeGeometry::new();
        geometry.push_contour([Point2::new(0.0, 0.0), Point2::new(1.0, 17.0)]);
        geometry.push_contour([Point2::new(0.0, 0.0), Point2::new(13.0, 1.0)]);
        let outline = HitmapBuilder::new(1.0).rasterize(&geometry);

        for y in 0..=17 {
            assert!(
                (0..outline.width()).any(|x| outline.get(x, y)),
                "row {y} has no outline cell"
            );
        }
        for x in 0..=13 {
            assert!(
                (0..outline.height()).any(|y| outline.get(x, y)),
                "column {x} has no outline cell"
            );
        }
    }

    #[test]
    fn enclosed_hole_is_never_outside_and_padding_stays_out() {
        let mut geometry = ShapeGeometry::new();
        rectangle(&mut geometry, 0.0, 0.0, 12.0, 12.0);
        rectangle(&mut geometry, 4.0, 4.0, 8.0, 8.0);
        let builder = HitmapBuilder::new(1.0).spacing(2);

        let outline = builder.rasterize(&geometry);
        let outside = flood_outside(&outline);
        for y in 5..8 {
            for x in 5..8 {
                assert!(!outside.get(x, y), "hole cell ({x},{y}) leaked outside");
            }
        }
        for y in 1..12 {
            for x in 1..12 {
                assert!(!outside.get(x, y), "interior cell ({x},{y}) marked outside");
            }
        }

        let footprint = builder.build(&geometry);
        assert_eq!(footprint.width(), 13 + 4);
        assert_eq!(footprint.height(), 13 + 4);
        // 膨胀只向实体外扩张，占位图恰为整块外扩后的方形。
        assert_eq!(footprint.count_occupied(), 17 * 17);
    }

    #[test]
    fn open_contour_does_not_trap_cells() {
        let mut geometry = ShapeGeometry::new();
        geometry.push_contour([
            Point2::new(0.0, 0.0),
            Point2::new(8.0, 0.0),
            Point2::new(8.0, 8.0),
            Point2::new(0.0, 8.0),
        ]);
        let outline = HitmapBuilder::new(1.0).rasterize(&geometry);
        let outside = flood_outside(&outline);
        assert!(outside.get(4, 4));
    }

    #[test]
    fn dilation_pads_every_side() {
        let solid = OccupancyGrid::from_pattern(&["#"]);
        let padded = dilate(&solid, 1);
        assert_eq!(padded, OccupancyGrid::from_pattern(&["###", "###", "###"]));

        let solid = OccupancyGrid::from_pattern(&["#..", "..."]);
        let padded = dilate(&solid, 1);
        assert_eq!(
            padded,
            OccupancyGrid::from_pattern(&["###..", "###..", "###..", "....."])
        );
        assert_eq!(dilate(&solid, 0), solid);
    }

    fn assert_rows_reversed(normal: &OccupancyGrid, mirrored: &OccupancyGrid) {
        assert_eq!(normal.width(), mirrored.width());
        assert_eq!(normal.height(), mirrored.height());
        let last = normal.height() - 1;
        for y in 0..normal.height() {
            assert_eq!(normal.row(y), mirrored.row(last - y), "row {y}");
        }
    }

    #[test]
    fn mirrored_raster_reverses_rows() {
        let mut geometry = ShapeGeometry::new();
        geometry.push_contour([
            Point2::new(0.0, 0.0),
            Point2::new(6.0, 0.0),
            Point2::new(0.0, 4.0),
            Point2::new(0.0, 0.0),
        ]);
        let normal = HitmapBuilder::new(1.0).build(&geometry);
        let mirrored = HitmapBuilder::new(1.0).mirrored(true).build(&geometry);
        assert_rows_reversed(&normal, &mirrored);
    }

    #[test]
    fn mirrored_raster_reverses_rows_for_fractional_height() {
        let mut geometry = ShapeGeometry::new();
        rectangle(&mut geometry, 0.0, 0.0, 3.0, 2.4);
        let normal = HitmapBuilder::new(1.0).build(&geometry);
        let mirrored = HitmapBuilder::new(1.0).mirrored(true).build(&geometry);

        assert_eq!(
            normal,
            OccupancyGrid::from_pattern(&["####", "####", "####", "...."])
        );
        assert_eq!(
            mirrored,
            OccupancyGrid::from_pattern(&["....", "####", "####", "####"])
        );
        assert_rows_reversed(&normal, &mirrored);

        let padded = HitmapBuilder::new(1.0).spacing(1).mirrored(true).build(&geometry);
        let reference = HitmapBuilder::new(1.0).spacing(1).build(&geometry);
        assert_rows_reversed(&reference, &padded);
    }

    #[test]
    fn scale_changes_grid_size() {
        let mut geometry = ShapeGeometry::new();
        rectangle(&mut geometry, 0.0, 0.0, 10.0, 5.0);
        assert_eq!(HitmapBuilder::new(1.0).grid_size(&geometry), (11, 6));
        assert_eq!(HitmapBuilder::new(0.5).grid_size(&geometry), (6, 4));
        assert_eq!(HitmapBuilder::new(2.0).grid_size(&geometry), (21, 11));
    }
}
