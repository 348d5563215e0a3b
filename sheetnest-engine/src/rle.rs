//! 栅格的行程编码。
//!
//! 每行压缩为升序、互不重叠的闭区间 `[start, end]`（`end` 为最后一个占用列，含）。
//! 编码、解码与重叠测试统一使用闭区间约定。

use crate::grid::OccupancyGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    #[inline]
    pub fn contains(&self, x: usize) -> bool {
        self.start <= x && x <= self.end
    }

    #[inline]
    pub fn shifted(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RleRow {
    spans: Vec<Span>,
}

impl RleRow {
    pub fn encode(cells: &[bool]) -> Self {
        let mut spans = Vec::new();
        let mut start: Option<usize> = None;
        for (x, cell) in cells.iter().enumerate() {
            match (*cell, start) {
                (true, None) => start = Some(x),
                (false, Some(s)) => {
                    spans.push(Span::new(s, x - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push(Span::new(s, cells.len() - 1));
        }
        Self { spans }
    }

    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// 最后一个区间的结束列。
    #[inline]
    pub fn last_end(&self) -> Option<usize> {
        self.spans.last().map(|span| span.end)
    }

    pub fn contains(&self, x: usize) -> bool {
        let index = self.spans.partition_point(|span| span.end < x);
        self.spans.get(index).is_some_and(|span| span.contains(x))
    }

    /// 本行整体右移 `offset` 后是否与 `other` 有任意重叠。两侧均有序，线性归并即可。
    pub fn overlaps(&self, other: &RleRow, offset: usize) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.spans.len() && j < other.spans.len() {
            let a = self.spans[i].shifted(offset);
            let b = other.spans[j];
            if a.overlaps(&b) {
                return true;
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    pub fn occupied(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }
}

/// 整个栅格的行程编码。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleGrid {
    width: usize,
    height: usize,
    rows: Vec<RleRow>,
}

impl RleGrid {
    pub fn encode(grid: &OccupancyGrid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            rows: (0..grid.height())
                .map(|y| RleRow::encode(grid.row(y)))
                .collect(),
        }
    }

    pub fn decode(&self) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(self.width, self.height);
        for (y, row) in self.rows.iter().enumerate() {
            for span in row.spans() {
                for x in span.start..=span.end {
                    grid.set(x, y, true);
                }
            }
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn rows(&self) -> &[RleRow] {
        &self.rows
    }

    /// 第 `y` 行；越界时返回空行。
    pub fn row(&self, y: usize) -> &RleRow {
        static EMPTY: RleRow = RleRow { spans: Vec::new() };
        self.rows.get(y).unwrap_or(&EMPTY)
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.row(y).contains(x)
    }

    pub fn occupied(&self) -> usize {
        self.rows.iter().map(RleRow::occupied).sum()
    }
}
