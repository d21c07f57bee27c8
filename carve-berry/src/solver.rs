//! 分割求解步骤的接口.
//!
//! 真正的求解器 (最小生成树分割, 分水岭等) 位于本 crate 之外, 通过 [`Solver`]
//! 接入. 这里只提供一个不做任何传播的基线实现 [`SeedOnly`].

use ndarray::ArrayView2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{label, DEFAULT_BACKGROUND_PRIORITY, DEFAULT_NO_BIAS_BELOW};
use crate::graph::Adjacency;

/// 不确定度输出模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Uncertainty {
    /// 不计算不确定度.
    #[default]
    None,

    /// 计算局部裕度.
    LocalMargin,

    /// 计算交换代价.
    ExchangeCount,
}

/// 交互式 carving 的两个可调参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CarvingParams {
    /// 背景偏置, 取值 `[0.0, 1.0]`.
    pub background_priority: f32,

    /// 低于该值的边权不施加背景偏置, 取值 `[0, 255]`.
    pub no_bias_below: u8,

    /// 不确定度输出模式.
    pub uncertainty: Uncertainty,
}

impl Default for CarvingParams {
    fn default() -> Self {
        Self {
            background_priority: DEFAULT_BACKGROUND_PRIORITY,
            no_bias_below: DEFAULT_NO_BIAS_BELOW,
            uncertainty: Uncertainty::None,
        }
    }
}

impl CarvingParams {
    /// 转换为一次求解所需的参数. 标签优先级按 `[未设置, 背景, 前景]` 组织.
    pub fn solve_params(&self) -> SolveParams {
        SolveParams {
            prios: [1.0, self.background_priority.clamp(0.0, 1.0), 1.0],
            uncertainty: self.uncertainty,
            no_bias_below: self.no_bias_below,
        }
    }
}

/// 传给求解器的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolveParams {
    /// 各标签优先级, 按 `[未设置, 背景, 前景]` 组织.
    pub prios: [f32; 3],

    /// 不确定度输出模式.
    pub uncertainty: Uncertainty,

    /// 无偏置阈值.
    pub no_bias_below: u8,
}

/// 一次求解的全部输入.
pub struct SolveInput<'a> {
    /// 超体素邻接图.
    pub adjacency: &'a Adjacency,

    /// 超体素级种子, 长度为节点个数.
    pub seeds: &'a [u8],

    /// 一元势, 形状为 `(节点个数, 标签个数 + 1)`.
    pub unaries: ArrayView2<'a, f32>,

    /// 求解参数.
    pub params: &'a SolveParams,
}

/// 由种子计算超体素分割的求解器.
///
/// 实现者必须将 `out` 的每一项写为 [`label::BACKGROUND`] 或 [`label::FOREGROUND`].
pub trait Solver: Send + Sync {
    /// 求解. `out` 长度与 `input.seeds` 相同.
    fn solve(&self, input: &SolveInput<'_>, out: &mut [u8]);
}

/// 基线求解器: 被前景种子覆盖的超体素为前景, 其余全部为背景.
#[derive(Copy, Clone, Debug, Default)]
pub struct SeedOnly;

impl Solver for SeedOnly {
    fn solve(&self, input: &SolveInput<'_>, out: &mut [u8]) {
        debug_assert_eq!(input.seeds.len(), out.len());
        for (o, s) in out.iter_mut().zip(input.seeds) {
            *o = if label::is_foreground(*s) {
                label::FOREGROUND
            } else {
                label::BACKGROUND
            };
        }
    }
}

impl<F> Solver for F
where
    F: Fn(&SolveInput<'_>, &mut [u8]) + Send + Sync,
{
    #[inline]
    fn solve(&self, input: &SolveInput<'_>, out: &mut [u8]) {
        self(input, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_default_params() {
        let p = CarvingParams::default();
        assert_eq!(p.no_bias_below, 64);
        let sp = p.solve_params();
        assert_eq!(sp.prios, [1.0, 0.95, 1.0]);
        assert_eq!(sp.uncertainty, Uncertainty::None);
    }

    #[test]
    fn test_priority_clamped() {
        let p = CarvingParams {
            background_priority: 3.0,
            ..Default::default()
        };
        assert_eq!(p.solve_params().prios[1], 1.0);
    }

    #[test]
    fn test_seed_only() {
        let adj = Adjacency::default();
        let seeds = [0, 1, 2, 0, 2];
        let unaries = Array2::<f32>::zeros((5, 3));
        let params = CarvingParams::default().solve_params();
        let input = SolveInput {
            adjacency: &adj,
            seeds: &seeds,
            unaries: unaries.view(),
            params: &params,
        };
        let mut out = [0; 5];
        SeedOnly.solve(&input, &mut out);
        assert_eq!(out, [1, 1, 2, 1, 2]);
    }
}
