//! 通用常量.

/// 种子与分割查找表中使用的标签值.
pub mod label {
    /// 未设置种子.
    pub const UNSET: u8 = 0;

    /// 背景标签. 同时用作背景种子.
    pub const BACKGROUND: u8 = 1;

    /// 前景标签. 同时用作前景种子.
    pub const FOREGROUND: u8 = 2;

    /// 标注画笔在 "橡皮擦" 模式下写出的值.
    pub const ERASER_PAINT: u8 = 100;

    /// 分割引擎认可的 "清除种子" 哨兵值.
    pub const SEED_CLEAR: u8 = 255;

    /// 值是否是前景?
    #[inline]
    pub const fn is_foreground(v: u8) -> bool {
        matches!(v, FOREGROUND)
    }

    /// 值是否是背景?
    #[inline]
    pub const fn is_background(v: u8) -> bool {
        matches!(v, BACKGROUND)
    }

    /// 将标注画笔写出的值转换为分割引擎理解的值.
    ///
    /// 橡皮擦值 100 被映射为 255, 其余值原样保留.
    #[inline]
    pub const fn remap_eraser(v: u8) -> u8 {
        if v == ERASER_PAINT {
            SEED_CLEAR
        } else {
            v
        }
    }
}

/// 未分配目标的目标编号.
pub const NO_OBJECT: u32 = 0;

/// 第一个可分配的目标编号.
pub const FIRST_OBJECT: u32 = 1;

/// 求解时的标签个数 (背景, 前景).
pub const LABEL_COUNT: usize = 2;

/// 默认背景优先级.
pub const DEFAULT_BACKGROUND_PRIORITY: f32 = 0.95;

/// 默认无偏置阈值. 低于该值的边权不施加背景偏置.
pub const DEFAULT_NO_BIAS_BELOW: u8 = 64;

#[cfg(test)]
mod tests {
    use super::label::*;

    #[test]
    fn test_remap_eraser() {
        assert_eq!(remap_eraser(ERASER_PAINT), SEED_CLEAR);
        for v in [UNSET, BACKGROUND, FOREGROUND, SEED_CLEAR, 3, 99, 101] {
            assert_eq!(remap_eraser(v), v);
        }
    }
}
