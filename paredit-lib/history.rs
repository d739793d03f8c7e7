//! Undo and redo.
//!
//! Every recorded edit becomes an [`UndoStep::Edit`] holding the text it
//! inserted and the text it removed, so it can be replayed in both
//! directions against a [`LineInputModel`]. Consecutive typing, repeated
//! deletes and repeated backspaces coalesce into a single step until an undo
//! stop is inserted. Edits made inside [`UndoManager::with_undo`] are grouped
//! and undone as one unit.

use paredit_core::chars::char_len;

use crate::model::LineInputModel;

/// A selection as a pair of offsets. `end` is where the caret sits and may
/// be smaller than `start`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
  pub start: usize,
  pub end:   usize,
}

impl Selection {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  /// An empty selection at `offset`.
  pub fn point(offset: usize) -> Self {
    Self::new(offset, offset)
  }

  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  pub fn min(&self) -> usize {
    self.start.min(self.end)
  }

  pub fn max(&self) -> usize {
    self.start.max(self.end)
  }
}

/// The state an undo step needs to replay itself.
pub trait UndoContext {
  fn model_mut(&mut self) -> &mut LineInputModel;
  fn selection(&self) -> Selection;
  fn set_selection(&mut self, selection: Selection);
}

/// A reversible change to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoStep {
  Edit {
    start:         usize,
    inserted:      String,
    deleted:       String,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
    undo_stop:     bool,
  },
  /// Steps applied atomically, in order.
  Group {
    steps:         Vec<UndoStep>,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
    undo_stop:     bool,
  },
}

impl UndoStep {
  pub fn edit(
    start: usize,
    inserted: impl Into<String>,
    deleted: impl Into<String>,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
  ) -> Self {
    Self::Edit {
      start,
      inserted: inserted.into(),
      deleted: deleted.into(),
      old_selection,
      new_selection,
      undo_stop: false,
    }
  }

  pub fn undo_stop(&self) -> bool {
    match self {
      Self::Edit { undo_stop, .. } | Self::Group { undo_stop, .. } => *undo_stop,
    }
  }

  pub fn set_undo_stop(&mut self, stop: bool) {
    match self {
      Self::Edit { undo_stop, .. } | Self::Group { undo_stop, .. } => *undo_stop = stop,
    }
  }

  /// Replace the selections restored by undo and redo.
  fn with_selections(mut self, before: Selection, after: Selection) -> Self {
    match &mut self {
      Self::Edit {
        old_selection,
        new_selection,
        ..
      }
      | Self::Group {
        old_selection,
        new_selection,
        ..
      } => {
        *old_selection = Some(before);
        *new_selection = Some(after);
      },
    }
    self
  }

  /// Try to merge `next` into this step. Returns `next` back when the two
  /// cannot be merged.
  pub fn coalesce(&mut self, next: UndoStep) -> Option<UndoStep> {
    let Self::Edit {
      start,
      inserted,
      deleted,
      new_selection,
      ..
    } = self
    else {
      return Some(next);
    };
    let UndoStep::Edit {
      start: next_start,
      inserted: next_inserted,
      deleted: next_deleted,
      new_selection: next_selection,
      ..
    } = &next
    else {
      return Some(next);
    };

    let typing = deleted.is_empty()
      && next_deleted.is_empty()
      && !inserted.is_empty()
      && !next_inserted.is_empty();
    let deleting = !deleted.is_empty()
      && !next_deleted.is_empty()
      && inserted.is_empty()
      && next_inserted.is_empty();

    if typing && *start + char_len(inserted) == *next_start {
      inserted.push_str(next_inserted);
    } else if deleting && *start == *next_start {
      // delete key held down
      deleted.push_str(next_deleted);
    } else if deleting && start.checked_sub(char_len(next_deleted)) == Some(*next_start) {
      // backspace held down
      *start = *next_start;
      deleted.insert_str(0, next_deleted);
    } else {
      return Some(next);
    }
    *new_selection = *next_selection;
    None
  }

  fn undo<C: UndoContext + ?Sized>(&self, ctx: &mut C) {
    match self {
      Self::Edit {
        start,
        inserted,
        deleted,
        old_selection,
        ..
      } => {
        ctx.model_mut().change_range(
          *start,
          start + char_len(inserted),
          deleted,
          None,
          None,
        );
        if let Some(selection) = old_selection {
          ctx.set_selection(*selection);
        }
      },
      Self::Group {
        steps,
        old_selection,
        ..
      } => {
        for step in steps.iter().rev() {
          step.undo(ctx);
        }
        if let Some(selection) = old_selection {
          ctx.set_selection(*selection);
        }
      },
    }
  }

  fn redo<C: UndoContext + ?Sized>(&self, ctx: &mut C) {
    match self {
      Self::Edit {
        start,
        inserted,
        deleted,
        new_selection,
        ..
      } => {
        ctx.model_mut().change_range(
          *start,
          start + char_len(deleted),
          inserted,
          None,
          None,
        );
        if let Some(selection) = new_selection {
          ctx.set_selection(*selection);
        }
      },
      Self::Group {
        steps,
        new_selection,
        ..
      } => {
        for step in steps {
          step.redo(ctx);
        }
        if let Some(selection) = new_selection {
          ctx.set_selection(*selection);
        }
      },
    }
  }
}

/// Push `step` onto `steps`, merging it into the top unless that is an undo
/// stop.
fn push_coalescing(steps: &mut Vec<UndoStep>, step: UndoStep) {
  let step = match steps.last_mut() {
    Some(top) if !top.undo_stop() => top.coalesce(step),
    _ => Some(step),
  };
  if let Some(step) = step {
    steps.push(step);
  }
}

/// Undo and redo stacks for one buffer.
#[derive(Debug, Default, Clone)]
pub struct UndoManager {
  undos: Vec<UndoStep>,
  redos: Vec<UndoStep>,
  /// Steps collected by the outermost open [`UndoManager::with_undo`].
  group: Option<Vec<UndoStep>>,
}

impl UndoManager {
  pub fn undos(&self) -> &[UndoStep] {
    &self.undos
  }

  pub fn redos(&self) -> &[UndoStep] {
    &self.redos
  }

  pub fn can_undo(&self) -> bool {
    !self.undos.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.redos.is_empty()
  }

  /// Record a step, coalescing it into the previous one where possible.
  /// Always clears the redo stack.
  pub fn add_undo_step(&mut self, step: UndoStep) {
    match &mut self.group {
      Some(group) => push_coalescing(group, step),
      None => push_coalescing(&mut self.undos, step),
    }
    self.redos.clear();
  }

  /// Open a group. Returns false when one is already open, in which case
  /// the caller's steps join the outer group.
  pub fn begin_group(&mut self) -> bool {
    if self.group.is_some() {
      return false;
    }
    self.group = Some(Vec::new());
    true
  }

  /// Close the open group and record it, restoring `before` on undo and
  /// `after` on redo. Empty groups are dropped and a group of one step is
  /// recorded as that step.
  pub fn end_group(&mut self, before: Selection, after: Selection) {
    let Some(mut steps) = self.group.take() else {
      return;
    };
    let step = match steps.len() {
      0 => return,
      1 => steps.remove(0).with_selections(before, after),
      _ => {
        UndoStep::Group {
          steps,
          old_selection: Some(before),
          new_selection: Some(after),
          undo_stop: false,
        }
      },
    };
    self.add_undo_step(step);
  }

  /// Prevent the most recent step from absorbing later ones.
  pub fn insert_undo_stop(&mut self) {
    if let Some(top) = self.undos.last_mut() {
      top.set_undo_stop(true);
    }
  }

  /// Run `body` with every recorded edit collected into one group.
  pub fn with_undo<C, R>(ctx: &mut C, body: impl FnOnce(&mut C) -> R) -> R
  where
    C: UndoContext + ?Sized,
  {
    let opened = ctx.model_mut().undo_manager.begin_group();
    let before = ctx.selection();
    let result = body(ctx);
    if opened {
      let after = ctx.selection();
      ctx.model_mut().undo_manager.end_group(before, after);
    }
    result
  }

  /// Revert the top undo step, if any, and move it to the redo stack.
  pub fn undo<C: UndoContext + ?Sized>(ctx: &mut C) {
    let Some(step) = ctx.model_mut().undo_manager.undos.pop() else {
      return;
    };
    tracing::debug!(redos = ctx.model_mut().undo_manager.redos.len(), "undo");
    replaying(ctx, |ctx| step.undo(ctx));
    ctx.model_mut().undo_manager.redos.push(step);
  }

  /// Reapply the top redo step, if any, and move it back to the undo stack.
  pub fn redo<C: UndoContext + ?Sized>(ctx: &mut C) {
    let Some(step) = ctx.model_mut().undo_manager.redos.pop() else {
      return;
    };
    tracing::debug!(undos = ctx.model_mut().undo_manager.undos.len(), "redo");
    replaying(ctx, |ctx| step.redo(ctx));
    ctx.model_mut().undo_manager.undos.push(step);
  }
}

/// Run `f` with undo recording switched off.
fn replaying<C: UndoContext + ?Sized>(ctx: &mut C, f: impl FnOnce(&mut C)) {
  let recording = std::mem::replace(&mut ctx.model_mut().recording_undo, false);
  f(ctx);
  ctx.model_mut().recording_undo = recording;
}

#[cfg(test)]
mod test {
  use super::*;

  #[derive(Default)]
  struct Buffer {
    model:     LineInputModel,
    selection: Selection,
  }

  impl UndoContext for Buffer {
    fn model_mut(&mut self) -> &mut LineInputModel {
      &mut self.model
    }

    fn selection(&self) -> Selection {
      self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
      self.selection = selection;
    }
  }

  impl Buffer {
    fn type_at(&mut self, offset: usize, text: &str) {
      let old = Selection::point(offset);
      let new = Selection::point(offset + char_len(text));
      self.model.recording_undo = true;
      self.model.insert_string(offset, text, Some(old), Some(new));
      self.model.recording_undo = false;
      self.selection = new;
    }

    fn text(&self) -> String {
      self.model.text()
    }
  }

  #[test]
  fn test_typing_coalesces() {
    let mut buffer = Buffer::default();
    buffer.type_at(0, "a");
    buffer.type_at(1, "b");
    buffer.type_at(2, "c");
    assert_eq!(buffer.model.undo_manager.undos().len(), 1);
    UndoManager::undo(&mut buffer);
    assert_eq!(buffer.text(), "");
    assert_eq!(buffer.selection, Selection::point(0));
    UndoManager::redo(&mut buffer);
    assert_eq!(buffer.text(), "abc");
    assert_eq!(buffer.selection, Selection::point(3));
  }

  #[test]
  fn test_undo_stop_prevents_coalescing() {
    let mut buffer = Buffer::default();
    buffer.type_at(0, "a");
    buffer.model.undo_manager.insert_undo_stop();
    buffer.type_at(1, "b");
    assert_eq!(buffer.model.undo_manager.undos().len(), 2);
    UndoManager::undo(&mut buffer);
    assert_eq!(buffer.text(), "a");
  }

  #[test]
  fn test_coalesce_deletes() {
    let mut step = UndoStep::edit(5, "", "a", None, None);
    // delete key
    assert_eq!(step.coalesce(UndoStep::edit(5, "", "b", None, None)), None);
    // backspace
    assert_eq!(step.coalesce(UndoStep::edit(4, "", "x", None, None)), None);
    assert_eq!(step, UndoStep::edit(4, "", "xab", None, None));
    // unrelated
    let other = UndoStep::edit(0, "", "q", None, None);
    assert_eq!(step.coalesce(other.clone()), Some(other));
  }

  #[test]
  fn test_new_step_clears_redo() {
    let mut buffer = Buffer::default();
    buffer.type_at(0, "a");
    UndoManager::undo(&mut buffer);
    assert!(buffer.model.undo_manager.can_redo());
    buffer.type_at(0, "b");
    assert!(!buffer.model.undo_manager.can_redo());
  }

  #[test]
  fn test_empty_stacks_are_noops() {
    let mut buffer = Buffer::default();
    UndoManager::undo(&mut buffer);
    UndoManager::redo(&mut buffer);
    assert_eq!(buffer.text(), "");
  }

  #[test]
  fn test_groups() {
    let mut buffer = Buffer::default();
    buffer.type_at(0, "(x)");
    buffer.model.undo_manager.insert_undo_stop();

    UndoManager::with_undo(&mut buffer, |buffer| {
      buffer.model.recording_undo = true;
      buffer.model.delete_range(2, 1, None, None);
      buffer.model.delete_range(0, 1, None, None);
      buffer.model.recording_undo = false;
      buffer.selection = Selection::point(0);
    });
    assert_eq!(buffer.text(), "x");
    assert_eq!(buffer.model.undo_manager.undos().len(), 2);
    assert!(matches!(
      buffer.model.undo_manager.undos().last(),
      Some(UndoStep::Group { .. })
    ));

    UndoManager::undo(&mut buffer);
    assert_eq!(buffer.text(), "(x)");
    assert_eq!(buffer.selection, Selection::point(3));
    UndoManager::redo(&mut buffer);
    assert_eq!(buffer.text(), "x");
    assert_eq!(buffer.selection, Selection::point(0));
  }

  #[test]
  fn test_nested_groups_join_the_outer_one() {
    let mut buffer = Buffer::default();
    UndoManager::with_undo(&mut buffer, |buffer| {
      buffer.type_at(0, "a");
      UndoManager::with_undo(buffer, |buffer| {
        buffer.model.undo_manager.insert_undo_stop();
        buffer.type_at(1, "b");
      });
      assert!(buffer.model.undo_manager.undos().is_empty());
    });
    assert_eq!(buffer.model.undo_manager.undos().len(), 1);
    UndoManager::undo(&mut buffer);
    assert_eq!(buffer.text(), "");
  }

  #[test]
  fn test_empty_group_is_dropped() {
    let mut buffer = Buffer::default();
    UndoManager::with_undo(&mut buffer, |_| {});
    assert!(!buffer.model.undo_manager.can_undo());
  }
}
