use std::fmt;

/// 行主序的稠密布尔栅格。越界读取返回 `false`，越界写入被拒绝。
#[derive(Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, false)
    }

    pub fn filled(width: usize, height: usize, value: bool) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// 以字符图案构造栅格，`#` 表示占用，其余字符表示空闲。各行需等宽。
    pub fn from_pattern(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
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
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.index(x, y).is_some_and(|i| self.cells[i])
    }

    /// 写入单元格，越界时返回 `false`。
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    /// 某一行的切片；越界返回空切片。
    pub fn row(&self, y: usize) -> &[bool] {
        if y < self.height {
            &self.cells[y * self.width..(y + 1) * self.width]
        } else {
            &[]
        }
    }

    pub fn count_occupied(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }

    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            cells: self.cells.iter().map(|cell| !cell).collect(),
        }
    }

    /// 行序倒置（关于水平轴翻转）后的副本。
    pub fn flipped_rows(&self) -> Self {
        let cells = (0..self.height)
            .rev()
            .flat_map(|y| self.row(y).iter().copied())
            .collect();
        Self {
            width: self.width,
            height: self.height,
            cells,
        }
    }

    /// 占用单元格的包围范围 `(min_x, min_y, max_x, max_y)`，全部空闲时为 `None`。
    pub fn occupied_bounds(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for y in 0..self.height {
            for (x, cell) in self.row(y).iter().enumerate() {
                if !cell {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }
}

impl fmt::Debug for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OccupancyGrid {}x{}", self.width, self.height)?;
        for y in 0..self.height {
            let line: String = self
                .row(y)
                .iter()
                .map(|cell| if *cell { '#' } else { '.' })
                .collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
