//! 基于行程编码的贪心排样。
//!
//! 每个实例在板材上按行扫描候选位置，以 `x + y` 评分，取最低者；允许时再以镜像朝向
//! 重试一次，仅当镜像得分严格更低时才采用。放不下的实例直接丢弃。

use serde::{Deserialize, Serialize};
use sheetnest_core::{geometry::Point2, layout::LayoutEntry};
use tracing::debug;

use crate::grid::OccupancyGrid;
use crate::rle::RleGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSpec {
    pub width: usize,
    pub height: usize,
    /// 形状之间的最小间距（栅格单元）。
    pub spacing: usize,
    pub allow_mirror: bool,
}

impl SheetSpec {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            spacing: 0,
            allow_mirror: false,
        }
    }

    pub fn with_spacing(mut self, spacing: usize) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_mirror(mut self, allow_mirror: bool) -> Self {
        self.allow_mirror = allow_mirror;
        self
    }
}

/// 待排样的一种形状：同一占位图被其全部实例复用。
#[derive(Debug, Clone)]
pub struct PackItem {
    pub key: String,
    pub quantity: usize,
    pub scale: f64,
    pub mirror_eligible: bool,
    /// 已含间距膨胀的占位图。
    pub footprint: RleGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    Mirrored,
}

impl Orientation {
    #[inline]
    pub fn is_mirrored(self) -> bool {
        matches!(self, Orientation::Mirrored)
    }

    /// 占位图第 `dy` 行在该朝向下对应的源行。
    #[inline]
    fn source_row(self, dy: usize, height: usize) -> usize {
        match self {
            Orientation::Normal => dy,
            Orientation::Mirrored => height - 1 - dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: usize,
    pub y: usize,
    pub orientation: Orientation,
}

impl Placement {
    #[inline]
    pub fn score(&self) -> usize {
        self.x + self.y
    }
}

/// 板材占用状态：稠密栅格加惰性重建的行程编码缓存。
#[derive(Debug, Clone)]
pub struct SheetState {
    grid: OccupancyGrid,
    rle: Option<RleGrid>,
}

impl SheetState {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid: OccupancyGrid::new(width, height),
            rle: None,
        }
    }

    #[inline]
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    #[inline]
    pub fn is_cache_valid(&self) -> bool {
        self.rle.is_some()
    }

    pub fn rle(&mut self) -> &RleGrid {
        let grid = &self.grid;
        self.rle.get_or_insert_with(|| RleGrid::encode(grid))
    }

    /// 把占位图写入板材并使缓存失效。
    pub fn commit(&mut self, footprint: &RleGrid, placement: Placement) {
        let height = footprint.height();
        for dy in 0..height {
            let row = footprint.row(placement.orientation.source_row(dy, height));
            for span in row.spans() {
                for x in span.start..=span.end {
                    self.grid.set(placement.x + x, placement.y + dy, true);
                }
            }
        }
        self.rle = None;
    }
}

/// 占位图放在 `(x, y)` 时是否与板材已占用区域重叠。
pub fn collides(
    sheet: &RleGrid,
    footprint: &RleGrid,
    orientation: Orientation,
    x: usize,
    y: usize,
) -> bool {
    let height = footprint.height();
    (0..height).any(|dy| {
        footprint
            .row(orientation.source_row(dy, height))
            .overlaps(sheet.row(y + dy), x)
    })
}

/// 在给定朝向下寻找得分最低的无碰撞位置。
pub fn find_placement(
    sheet: &RleGrid,
    footprint: &RleGrid,
    orientation: Orientation,
) -> Option<Placement> {
    let (fw, fh) = (footprint.width(), footprint.height());
    if fw == 0 || fh == 0 || fw > sheet.width() || fh > sheet.height() {
        return None;
    }
    let max_x = sheet.width() - fw;
    let max_y = sheet.height() - fh;

    let mut best: Option<Placement> = None;
    for y in 0..=max_y {
        if best.is_some_and(|b| y >= b.score()) {
            break;
        }
        let row = sheet.row(y);
        let tail_start = row.last_end().unwrap_or(0);
        let candidates = std::iter::once(0)
            .chain(row.spans().iter().map(|span| span.end + 1))
            .chain(tail_start..=max_x)
            .filter(|&x| x <= max_x);

        for x in candidates {
            if best.is_some_and(|b| x + y >= b.score()) {
                continue;
            }
            if !collides(sheet, footprint, orientation, x, y) {
                best = Some(Placement { x, y, orientation });
            }
        }
    }
    best
}

pub struct Packer {
    spec: SheetSpec,
    sheet: SheetState,
}

impl Packer {
    pub fn new(spec: SheetSpec) -> Self {
        Self {
            spec,
            sheet: SheetState::new(spec.width, spec.height),
        }
    }

    #[inline]
    pub fn spec(&self) -> &SheetSpec {
        &self.spec
    }

    #[inline]
    pub fn sheet(&self) -> &SheetState {
        &self.sheet
    }

    /// 从空白板材开始，按给定顺序逐个实例排样。
    pub fn pack(&mut self, items: &[PackItem]) -> Vec<LayoutEntry> {
        self.sheet = SheetState::new(self.spec.width, self.spec.height);
        let mut layout = Vec::new();
        for item in items {
            for instance in 0..item.quantity {
                match self.place(item) {
                    Some(entry) => layout.push(entry),
                    None => debug!(
                        key = %item.key,
                        instance,
                        width = item.footprint.width(),
                        height = item.footprint.height(),
                        "实例无可用位置，已丢弃"
                    ),
                }
            }
        }
        layout
    }

    /// 放置单个实例；无可用位置时返回 `None` 且不修改板材。
    pub fn place(&mut self, item: &PackItem) -> Option<LayoutEntry> {
        let try_mirror = self.spec.allow_mirror && item.mirror_eligible;
        let sheet = self.sheet.rle();

        let mut best = find_placement(sheet, &item.footprint, Orientation::Normal);
        if try_mirror {
            if let Some(mirrored) = find_placement(sheet, &item.footprint, Orientation::Mirrored) {
                if best.is_none_or(|b| mirrored.score() < b.score()) {
                    best = Some(mirrored);
                }
            }
        }

        let placement = best?;
        self.sheet.commit(&item.footprint, placement);
        let spacing = self.spec.spacing as f64;
        Some(LayoutEntry::new(
            item.key.clone(),
            Point2::new(placement.x as f64 + spacing, placement.y as f64 + spacing),
            placement.orientation.is_mirrored(),
            item.scale,
        ))
    }
}
