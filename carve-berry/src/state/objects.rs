use std::collections::BTreeMap;

use itertools::Itertools;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::FIRST_OBJECT;
use crate::{Idx3d, ObjectNumber, SupervoxelId};

/// 一个命名目标的全部记录.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectRecord {
    /// 目标编号. 仅附加过种子、从未保存的名称没有编号.
    pub number: Option<ObjectNumber>,

    /// 目标包含的超体素, 升序. 目标被加载编辑期间为 `None`.
    pub supervoxels: Option<Vec<SupervoxelId>>,

    /// 前景种子体素, 行优先序.
    pub fg_voxels: Vec<Idx3d>,

    /// 背景种子体素, 行优先序.
    pub bg_voxels: Vec<Idx3d>,

    /// 保存时带前景种子的超体素.
    pub fg_supervoxels: Vec<SupervoxelId>,

    /// 保存时带背景种子的超体素.
    pub bg_supervoxels: Vec<SupervoxelId>,
}

impl ObjectRecord {
    /// 是否已经保存过 (拥有编号).
    #[inline]
    pub fn is_saved(&self) -> bool {
        self.number.is_some()
    }

    /// 当前是否计入 "已完成" 视图.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.supervoxels.is_some()
    }
}

/// 名称到目标记录的映射.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectTable {
    records: BTreeMap<String, ObjectRecord>,
}

impl ObjectTable {
    /// 按名称查找记录.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ObjectRecord> {
        self.records.get(name)
    }

    /// 按名称查找可变记录.
    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ObjectRecord> {
        self.records.get_mut(name)
    }

    /// 按名称获取记录, 不存在时插入空记录.
    #[inline]
    pub fn entry(&mut self, name: &str) -> &mut ObjectRecord {
        self.records.entry(name.to_string()).or_default()
    }

    /// 删除记录.
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<ObjectRecord> {
        self.records.remove(name)
    }

    /// 已保存目标个数.
    pub fn saved_len(&self) -> usize {
        self.records.values().filter(|r| r.is_saved()).count()
    }

    /// 名称 `name` 已有的目标编号.
    #[inline]
    pub fn number_of(&self, name: &str) -> Option<ObjectNumber> {
        self.records.get(name).and_then(|r| r.number)
    }

    /// 下一个空闲编号: 已有最大编号加一, 没有时为 1.
    pub fn next_free_number(&self) -> ObjectNumber {
        self.records
            .values()
            .filter_map(|r| r.number)
            .max()
            .map_or(FIRST_OBJECT, |m| m + 1)
    }

    /// 所有已保存目标的名称, 按编号升序.
    pub fn names_by_number(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|(name, r)| r.number.map(|n| (n, name)))
            .sorted()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// 超体素集合包含 `sv` 的所有已完成目标名称, 按编号升序.
    pub fn names_containing(&self, sv: SupervoxelId) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|(name, r)| {
                let svs = r.supervoxels.as_ref()?;
                svs.binary_search(&sv)
                    .is_ok()
                    .then_some((r.number.unwrap_or_default(), name))
            })
            .sorted()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// 每个超体素被多少个已完成目标覆盖.
    pub fn done_counts(&self, num_nodes: usize) -> Vec<u32> {
        let mut ans = vec![0u32; num_nodes];
        for sv in self
            .records
            .values()
            .filter_map(|r| r.supervoxels.as_ref())
            .flatten()
        {
            if let Some(c) = ans.get_mut(*sv as usize) {
                *c += 1;
            }
        }
        ans
    }

    /// 所有记录.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ObjectRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectRecord, ObjectTable};

    fn saved(number: u32, svs: Vec<u32>) -> ObjectRecord {
        ObjectRecord {
            number: Some(number),
            supervoxels: Some(svs),
            ..Default::default()
        }
    }

    #[test]
    fn test_next_free_number() {
        let mut t = ObjectTable::default();
        assert_eq!(t.next_free_number(), 1);
        *t.entry("a") = saved(1, vec![]);
        *t.entry("b") = saved(4, vec![]);
        // 只附加了种子的名称不占编号.
        t.entry("pending").fg_voxels.push((0, 0, 0));
        assert_eq!(t.next_free_number(), 5);
        assert_eq!(t.saved_len(), 2);
        assert_eq!(t.number_of("pending"), None);
    }

    #[test]
    fn test_lookup_and_counts() {
        let mut t = ObjectTable::default();
        *t.entry("z") = saved(1, vec![1, 2, 3]);
        *t.entry("a") = saved(2, vec![3, 4]);
        *t.entry("editing") = ObjectRecord {
            number: Some(3),
            supervoxels: None,
            ..Default::default()
        };
        assert_eq!(t.names_containing(3), vec!["z", "a"]);
        assert_eq!(t.names_containing(4), vec!["a"]);
        assert!(t.names_containing(0).is_empty());
        assert_eq!(t.done_counts(6), vec![0, 1, 1, 2, 1, 0]);
        assert_eq!(t.names_by_number(), vec!["z", "a", "editing"]);
    }
}
