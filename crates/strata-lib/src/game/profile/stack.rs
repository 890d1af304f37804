//! Ordered collection of patches, merged by reapply into a runtime profile.

use super::patch::{Patch, PatchDocument, PatchKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const ORDER_FILE: &str = "order.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OrderDocument {
    #[serde(default)]
    order: Vec<String>,
}

/// The ordered patch stack. Patches are kept sorted by their order number,
/// ties broken by insertion order; ids are unique within the stack.
#[derive(Debug, Default)]
pub struct VersionPatchStack {
    patches: Vec<Patch>,
}

impl VersionPatchStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every patch document from an instance's `patches/` directory and
    /// apply the saved user order if one exists. A missing directory yields
    /// an empty stack.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut stack = Self::new();
        if !dir.is_dir() {
            return Ok(stack);
        }

        let mut files: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_name().is_some_and(|name| name != ORDER_FILE)
            })
            .collect();
        files.sort();

        for path in files {
            let data = fs::read_to_string(&path)?;
            let doc: PatchDocument = serde_json::from_str(&data).map_err(|e| Error::Parse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
            stack.append(Patch::from_document(doc))?;
        }

        stack.apply_saved_order(dir)?;
        Ok(stack)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Patches in ascending merge order.
    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }

    pub fn patch(&self, index: usize) -> Option<&Patch> {
        self.patches.get(index)
    }

    pub fn patch_mut(&mut self, index: usize) -> Option<&mut Patch> {
        self.patches.get_mut(index)
    }

    pub fn patch_by_id(&self, id: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id() == id)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.id() == id)
    }

    pub fn minecraft_patch(&self) -> Option<&Patch> {
        self.patches.iter().find(|p| p.is_minecraft_version())
    }

    /// Append a patch, keeping the stack sorted. Exactly one patch may
    /// declare itself the minecraft-version patch; ids must be unique.
    pub fn append(&mut self, patch: Patch) -> Result<()> {
        if patch.is_minecraft_version() && self.minecraft_patch().is_some() {
            return Err(Error::structural(
                "the patch stack already contains a minecraft version patch",
            ));
        }
        if self.patch_by_id(patch.id()).is_some() {
            return Err(Error::structural(format!(
                "duplicate patch id '{}'",
                patch.id()
            )));
        }
        self.patches.push(patch);
        self.sort();
        Ok(())
    }

    /// Remove the patch at `index`. Refuses for non-removable patches.
    pub fn remove(&mut self, index: usize) -> bool {
        match self.patches.get(index) {
            Some(patch) if patch.is_removable() => {
                self.patches.remove(index);
                true
            }
            _ => false,
        }
    }

    pub fn remove_by_id(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(index) => self.remove(index),
            None => false,
        }
    }

    /// Swap order numbers (and positions) with the adjacent movable
    /// neighbor. A no-op at the stack boundaries or when either patch is
    /// pinned.
    pub fn move_patch(&mut self, index: usize, direction: MoveDirection) -> bool {
        let neighbor = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.patches.len() => index + 1,
            _ => return false,
        };
        if index >= self.patches.len() {
            return false;
        }
        if !self.patches[index].is_moveable() || !self.patches[neighbor].is_moveable() {
            return false;
        }

        let order_a = self.patches[index].order;
        let order_b = self.patches[neighbor].order;
        self.patches[index].order = order_b;
        self.patches[neighbor].order = order_a;
        self.patches.swap(index, neighbor);
        true
    }

    /// Reassign order numbers 0..n-1 by current position.
    pub fn reset_order(&mut self) {
        for (index, patch) in self.patches.iter_mut().enumerate() {
            patch.order = index as i32;
        }
    }

    /// Clone the patch at `index` into an editable, user-owned copy at the
    /// same position. The original is kept inside the copy for revert.
    pub fn customize(&mut self, index: usize) -> bool {
        match self.patches.get(index) {
            Some(patch) if patch.is_customizable() && !patch.is_custom() => {}
            _ => return false,
        }
        let original = self.patches.remove(index);
        let mut custom = Patch::new(PatchKind::Custom, original.doc.clone());
        custom.order = original.order;
        custom.base = Some(Box::new(original));
        self.patches.insert(index, custom);
        true
    }

    /// Discard a customization and restore the superseded original.
    pub fn revert_to_base(&mut self, index: usize) -> bool {
        match self.patches.get(index) {
            Some(patch) if patch.is_revertible() => {}
            _ => return false,
        }
        let custom = self.patches.remove(index);
        match custom.base {
            Some(base) => {
                let mut base = *base;
                base.order = custom.order;
                self.patches.insert(index, base);
                true
            }
            None => {
                self.patches.insert(index, custom);
                false
            }
        }
    }

    /// Persist the current patch order for the instance.
    pub fn save_order(&self, dir: &Path) -> Result<()> {
        let doc = OrderDocument {
            order: self.patches.iter().map(|p| p.id().to_string()).collect(),
        };
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(ORDER_FILE),
            serde_json::to_vec_pretty(&doc)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
        )?;
        Ok(())
    }

    /// Apply order numbers from a previously saved `order.json`, then
    /// re-sort. Unknown ids are ignored; missing files are not an error.
    pub fn apply_saved_order(&mut self, dir: &Path) -> Result<()> {
        let path = dir.join(ORDER_FILE);
        if !path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&path)?;
        let doc: OrderDocument = match serde_json::from_str(&data) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("ignoring unreadable patch order file {:?}: {}", path, e);
                return Ok(());
            }
        };
        for (order, id) in doc.order.iter().enumerate() {
            if let Some(index) = self.position_of(id) {
                self.patches[index].order = order as i32;
            }
        }
        self.sort();
        Ok(())
    }

    fn sort(&mut self) {
        // stable: ties keep insertion order
        self.patches.sort_by_key(|p| p.order);
    }
}
