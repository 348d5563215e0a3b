use glam::DVec2;
use sheetnest_core::geometry::Point2;
use thiserror::Error;

use crate::MAX_SEGMENTS;

#[derive(Debug, Error, PartialEq)]
pub enum NurbsError {
    #[error("样条阶数必须至少为 1（实际：{0}）")]
    InvalidDegree(usize),
    #[error("阶数 {degree} 的样条至少需要 {} 个控制点（实际：{count}）", .degree + 1)]
    TooFewControlPoints { degree: usize, count: usize },
    #[error("节点数量应为 {expected}（控制点数 + 阶数 + 1），实际为 {actual}")]
    KnotCountMismatch { expected: usize, actual: usize },
    #[error("节点向量必须单调不减且为有限值")]
    InvalidKnots,
    #[error("样条参数域为空")]
    DegenerateDomain,
    #[error("参数 {0} 处的权重和为零")]
    ZeroWeightSum(f64),
    #[error("控制多边形弦长 {0} 超出采样上限")]
    TooManySegments(f64),
}

/// 非均匀有理 B 样条，基函数按 Cox–de Boor 递推以迭代表格计算。
#[derive(Debug, Clone)]
pub struct NurbsCurve {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point2>,
    weights: Vec<f64>,
}

impl NurbsCurve {
    /// `weights` 可以短于控制点数量，缺失的权重按 1 处理，多余的忽略。
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point2>,
        weights: Vec<f64>,
    ) -> Result<Self, NurbsError> {
        if degree == 0 {
            return Err(NurbsError::InvalidDegree(degree));
        }
        let count = control_points.len();
        if count < degree + 1 {
            return Err(NurbsError::TooFewControlPoints { degree, count });
        }
        let expected = count + degree + 1;
        if knots.len() != expected {
            return Err(NurbsError::KnotCountMismatch {
                expected,
                actual: knots.len(),
            });
        }
        if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(NurbsError::InvalidKnots);
        }
        if knots[degree] >= knots[count] {
            return Err(NurbsError::DegenerateDomain);
        }

        let weights = (0..count)
            .map(|i| weights.get(i).copied().unwrap_or(1.0))
            .collect();

        Ok(Self {
            degree,
            knots,
            control_points,
            weights,
        })
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// 有效参数区间 `[u_p, u_{n+1}]`。
    #[inline]
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// 控制多边形的弦长（相邻控制点欧氏距离之和），用于估计采样数量。
    pub fn chord_length(&self) -> f64 {
        self.control_points
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// 参数 `u` 处全部控制点的基函数值 `N_{i,p}(u)`。
    pub fn basis(&self, u: f64) -> Vec<f64> {
        let p = self.degree;
        let count = self.control_points.len();
        let knots = &self.knots;
        let spans = knots.len() - 1;
        let (lo, hi) = self.domain();
        let u = u.clamp(lo, hi);

        // 区间右端点归入最后一个非空区间，保证末端基函数为 1。
        let span = if u >= hi {
            (0..count).rev().find(|&i| knots[i] < knots[i + 1])
        } else {
            (0..spans).find(|&i| knots[i] <= u && u < knots[i + 1])
        }
        .unwrap_or(p);

        let mut table = vec![0.0; spans];
        table[span] = 1.0;

        for k in 1..=p {
            for i in 0..spans - k {
                let left_den = knots[i + k] - knots[i];
                let right_den = knots[i + k + 1] - knots[i + 1];
                let left = if left_den > 0.0 {
                    (u - knots[i]) / left_den * table[i]
                } else {
                    0.0
                };
                let right = if right_den > 0.0 {
                    (knots[i + k + 1] - u) / right_den * table[i + 1]
                } else {
                    0.0
                };
                table[i] = left + right;
            }
        }

        table.truncate(count);
        table
    }

    pub fn evaluate(&self, u: f64) -> Result<Point2, NurbsError> {
        let basis = self.basis(u);
        let mut numerator = DVec2::ZERO;
        let mut denominator = 0.0;
        for ((n, w), point) in basis
            .iter()
            .zip(&self.weights)
            .zip(&self.control_points)
        {
            let factor = n * w;
            numerator += point.as_vec2() * factor;
            denominator += factor;
        }
        if denominator.abs() <= f64::EPSILON {
            return Err(NurbsError::ZeroWeightSum(u));
        }
        Ok(Point2::from_vec(numerator / denominator))
    }

    /// 在参数域上等距采样，段数取控制多边形弦长（向上取整，至少 1）。
    pub fn sample(&self) -> Result<Vec<Point2>, NurbsError> {
        let chord = self.chord_length().ceil();
        if !(chord <= MAX_SEGMENTS as f64) {
            return Err(NurbsError::TooManySegments(chord));
        }
        let segments = (chord as usize).max(1);
        let (lo, hi) = self.domain();
        (0..=segments)
            .map(|i| {
                let t = i as f64 / segments as f64;
                self.evaluate(lo + (hi - lo) * t)
            })
            .collect()
    }
}
