//! 选择集
//!
//! 有序去重的实体标识集合。去重以 `IdentityKey` 为准，
//! 保留首次出现的条目与插入顺序，后续重复（包括仅
//! `session_id` 不同的重复）被丢弃。

use std::collections::HashSet;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::identity::{EntityIdentity, IdentityKey};

/// 有序去重的标识集合
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    items: Vec<EntityIdentity>,
    keys: HashSet<IdentityKey>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个标识；若为重复项返回 `false`
    pub fn insert(&mut self, identity: EntityIdentity) -> bool {
        let key = identity.key();
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.insert(key);
        self.items.push(identity);
        true
    }

    /// 并入一批标识，保持首见顺序
    pub fn merge<I>(&mut self, identities: I) -> usize
    where
        I: IntoIterator<Item = EntityIdentity>,
    {
        let mut added = 0;
        for identity in identities {
            if self.insert(identity) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, identity: &EntityIdentity) -> bool {
        self.keys.contains(&identity.key())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityIdentity> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[EntityIdentity] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<EntityIdentity> {
        self.items
    }
}

impl FromIterator<EntityIdentity> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = EntityIdentity>>(iter: I) -> Self {
        let mut set = Self::new();
        set.merge(iter);
        set
    }
}

impl From<Vec<EntityIdentity>> for SelectionSet {
    fn from(items: Vec<EntityIdentity>) -> Self {
        items.into_iter().collect()
    }
}

impl IntoIterator for SelectionSet {
    type Item = EntityIdentity;
    type IntoIter = std::vec::IntoIter<EntityIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl Serialize for SelectionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SelectionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<EntityIdentity>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}
