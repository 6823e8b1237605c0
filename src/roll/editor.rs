//! Gesture-driven note editing.
//!
//! The editor keeps one box per note of the open melody and interprets
//! pointer gestures against them: drag a box to move it, drag an edge to
//! stretch it. Pointer movement accumulates into running deltas that edits
//! consume only as far as the note can actually travel; whatever is left
//! over stays pending, so a drag that hits a boundary resumes exactly when
//! the pointer crosses back over it instead of the moment it reverses.

use super::{RollMetrics, RollRect};
use crate::melody::{Melody, NoteId};

/// Fraction of a box's width that acts as a stretch handle at each edge...
const HANDLE_RATIO: f64 = 0.15;
/// ...unless the box is wide enough that the handle would exceed this.
const HANDLE_MAX: f64 = 10.0;

/// Default minimum note length: 1/16 of a beat (a 64th note).
const DEFAULT_SHORTEST_NOTE: f64 = 0.0625;

/// The edit a gesture performs, chosen at pointer-down from where the box
/// was struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOp {
    Translate,
    StretchLeft,
    StretchRight,
}

/// On-screen representation of a note.
///
/// Boxes reference notes by ID rather than holding them, so the note list
/// and the box cache can be reconciled independently.
#[derive(Debug, Clone)]
pub struct NoteBox {
    pub note_id: NoteId,
    pub rect: RollRect,
}

/// The piano-roll editing surface.
///
/// The editor never owns the melody; every operation borrows it from the
/// caller, so playback and editing observe the same notes.
pub struct RollEditor {
    metrics: RollMetrics,

    /// Minimum note length in beats the stretch operations clamp to.
    shortest_note: f64,

    boxes: Vec<NoteBox>,
    selected: Option<NoteId>,

    // Active gesture state
    op: GestureOp,
    gesture_active: bool,
    last_point: Option<(f64, f64)>,

    // Running pointer deltas; the unconsumed residue carries between events
    dx: f64,
    dy: f64,
}

impl RollEditor {
    pub fn new(metrics: RollMetrics) -> Self {
        Self {
            metrics,
            shortest_note: DEFAULT_SHORTEST_NOTE,
            boxes: Vec::new(),
            selected: None,
            op: GestureOp::Translate,
            gesture_active: false,
            last_point: None,
            dx: 0.0,
            dy: 0.0,
        }
    }

    /// Returns the display metrics in use.
    pub fn metrics(&self) -> &RollMetrics {
        &self.metrics
    }

    /// The minimum note length in beats.
    pub fn shortest_note(&self) -> f64 {
        self.shortest_note
    }

    /// Sets the minimum note length. A non-positive value is rejected and
    /// the prior value retained; returns whether the value was accepted.
    pub fn set_shortest_note(&mut self, beats: f64) -> bool {
        if beats > 0.0 && beats.is_finite() {
            self.shortest_note = beats;
            true
        } else {
            false
        }
    }

    /// Opens a melody for editing, regenerating every box.
    pub fn open_melody(&mut self, melody: &Melody) {
        self.selected = None;
        self.gesture_active = false;
        self.refresh(melody);
    }

    /// Rebuilds the box cache from the melody's current note list.
    /// Called on open, after transcription lands new notes, and after any
    /// structural change.
    pub fn refresh(&mut self, melody: &Melody) {
        self.boxes = melody
            .notes()
            .iter()
            .map(|note| NoteBox {
                note_id: note.id,
                rect: self.metrics.rect_from_note(note),
            })
            .collect();
    }

    /// Returns the current boxes, in note-list order.
    pub fn boxes(&self) -> &[NoteBox] {
        &self.boxes
    }

    /// Returns the selected note's ID, if any.
    pub fn selected(&self) -> Option<NoteId> {
        self.selected
    }

    /// Whether a pointer at the given position would strike a box.
    /// The first box in list order wins; a miss passes through to the
    /// surrounding view.
    #[allow(dead_code)]
    pub fn hit_test(&self, x: f64, y: f64) -> Option<NoteId> {
        self.boxes
            .iter()
            .find(|b| b.rect.contains(x, y))
            .map(|b| b.note_id)
    }

    /// Begins a gesture at the given device position.
    ///
    /// If a box is struck it becomes the selection, the running deltas are
    /// cleared, and the operation is chosen by the strike position: a
    /// narrow zone at either edge stretches, anywhere else translates.
    /// Returns true if a box was struck.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        for b in &self.boxes {
            if b.rect.contains(x, y) {
                self.selected = Some(b.note_id);
                self.dx = 0.0;
                self.dy = 0.0;
                self.last_point = Some((x, y));
                self.gesture_active = true;

                let handle = (b.rect.width * HANDLE_RATIO).min(HANDLE_MAX);
                self.op = if x < b.rect.x + handle {
                    GestureOp::StretchLeft
                } else if x >= b.rect.right() - handle {
                    GestureOp::StretchRight
                } else {
                    GestureOp::Translate
                };
                return true;
            }
        }
        false
    }

    /// Feeds pointer movement into the active gesture.
    ///
    /// Movement since the last event joins the running deltas, and the
    /// current operation consumes what it can. With no active gesture this
    /// is a silent no-op, never an error. Returns true if an edit ran.
    pub fn pointer_moved(&mut self, melody: &mut Melody, x: f64, y: f64) -> bool {
        if !self.gesture_active {
            return false;
        }
        let Some((last_x, last_y)) = self.last_point else {
            return false;
        };
        self.dx += x - last_x;
        self.dy += y - last_y;
        self.last_point = Some((x, y));

        match self.op {
            GestureOp::Translate => self.translate(melody),
            GestureOp::StretchLeft => self.stretch_left(melody),
            GestureOp::StretchRight => self.stretch_right(melody),
        }
        true
    }

    /// Ends the active gesture. The selection survives for a following
    /// delete or a new drag.
    pub fn pointer_up(&mut self) {
        self.gesture_active = false;
        self.last_point = None;
    }

    /// Removes the selected note from the melody and its box from the
    /// cache, then clears the selection. The two removals scan
    /// independently by ID, tolerating the lists drifting out of sync.
    /// Returns true if anything was removed.
    pub fn delete_selected(&mut self, melody: &mut Melody) -> bool {
        let Some(id) = self.selected.take() else {
            return false;
        };
        self.gesture_active = false;

        let removed_note = melody.remove_note(id).is_some();
        let removed_box = if let Some(pos) = self.boxes.iter().position(|b| b.note_id == id) {
            self.boxes.remove(pos);
            true
        } else {
            false
        };

        removed_note || removed_box
    }

    /// Moves the selected note by the accumulated deltas.
    ///
    /// Horizontal: the delta converts to beats and moves the onset, except
    /// that onset stops at zero. On a clamp only the distance actually
    /// travelled is consumed; the overshoot stays in `dx` so a later
    /// rightward drag has to walk back across it (exactly the distance the
    /// pointer sits left of zero) before the note moves again.
    ///
    /// Vertical: whole pitch rows are consumed out of `dy` as the pointer
    /// crosses them (dragging down lowers pitch); the sub-row remainder
    /// stays pending so the note tracks the pointer across row boundaries
    /// without drift. Rows the pitch range cannot absorb are left in `dy`.
    fn translate(&mut self, melody: &mut Melody) {
        let Some(id) = self.selected else { return };
        let Some(note) = melody.note_mut(id) else {
            return;
        };
        let Some(bx) = self.boxes.iter_mut().find(|b| b.note_id == id) else {
            return;
        };

        let d_beats = self.metrics.beats_from_x(self.dx);

        if d_beats < -note.onset {
            // Trying to move the note before time zero: stop it there and
            // keep the unused (negative) remainder pending
            self.dx += bx.rect.x;
            note.onset = 0.0;
            bx.rect.x = 0.0;
        } else {
            note.onset += d_beats;
            bx.rect.x += self.dx;
            self.dx = 0.0;
        }

        if self.dy.abs() > self.metrics.note_height {
            let rows = (self.dy.abs() / self.metrics.note_height).floor() as i32;
            // Screen Y grows downward, pitch grows upward
            let change = if self.dy > 0.0 { -rows } else { rows };

            let new_pitch = (note.pitch as i32 + change).clamp(0, 127);
            let applied = new_pitch - note.pitch as i32;
            note.pitch = new_pitch as u8;
            bx.rect.y -= self.metrics.note_height * applied as f64;

            // Consume only the rows that were applied; rows lost to the
            // 0..=127 clamp stay pending like any other boundary overshoot
            self.dy += applied as f64 * self.metrics.note_height;
        }
    }

    /// Grows or shrinks the selected note from its right edge.
    ///
    /// Shrinking stops at `shortest_note`; on a clamp the leftover is the
    /// (negative) portion of the drag the note could not absorb.
    fn stretch_right(&mut self, melody: &mut Melody) {
        let Some(id) = self.selected else { return };
        let Some(note) = melody.note_mut(id) else {
            return;
        };
        let Some(bx) = self.boxes.iter_mut().find(|b| b.note_id == id) else {
            return;
        };

        note.duration += self.metrics.beats_from_x(self.dx);

        if note.duration < self.shortest_note {
            // Take from the running total only what was actually used
            self.dx = -self.metrics.x_from_beats(self.shortest_note - note.duration);
            note.duration = self.shortest_note;
        } else {
            self.dx = 0.0;
        }

        bx.rect = self.metrics.rect_from_note(note);
    }

    /// Grows or shrinks the selected note from its left edge.
    ///
    /// Symmetric with [`Self::stretch_right`]: shortening from the left
    /// advances the onset by exactly the amount of duration consumed, and
    /// the minimum-length clamp leaves the unused drag pending.
    fn stretch_left(&mut self, melody: &mut Melody) {
        let Some(id) = self.selected else { return };
        let Some(note) = melody.note_mut(id) else {
            return;
        };
        let Some(bx) = self.boxes.iter_mut().find(|b| b.note_id == id) else {
            return;
        };

        let d_dur = self.metrics.beats_from_x(self.dx);
        note.duration -= d_dur;

        if note.duration < self.shortest_note {
            let unused = self.shortest_note - note.duration;
            self.dx = self.metrics.x_from_beats(unused);
            note.onset += d_dur - unused;
            note.duration = self.shortest_note;
        } else {
            note.onset += d_dur;
            self.dx = 0.0;
        }

        bx.rect = self.metrics.rect_from_note(note);
    }

    #[cfg(test)]
    fn pending_deltas(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    #[cfg(test)]
    fn active_op(&self) -> Option<GestureOp> {
        self.gesture_active.then_some(self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::Note;

    const EPS: f64 = 1e-9;

    /// One note at onset 1.0, duration 1.0, pitch 60, default metrics
    /// (beat_width 80, note_height 16): box spans x 80..160.
    fn one_note_setup() -> (Melody, RollEditor, NoteId) {
        let note = Note::new(60, 1.0, 1.0);
        let id = note.id;
        let melody = Melody::new(vec![note], 120.0, None);
        let mut editor = RollEditor::new(RollMetrics::default());
        editor.open_melody(&melody);
        (melody, editor, id)
    }

    fn mid_y(editor: &RollEditor) -> f64 {
        editor.metrics().y_from_pitch(60) + 8.0
    }

    #[test]
    fn test_hit_test_first_box_wins() {
        let n1 = Note::new(60, 0.0, 2.0);
        let n2 = Note::new(60, 1.0, 2.0); // Overlaps n1 from beat 1
        let first = n1.id;
        let melody = Melody::new(vec![n1, n2], 120.0, None);
        let mut editor = RollEditor::new(RollMetrics::default());
        editor.open_melody(&melody);

        let y = editor.metrics().y_from_pitch(60) + 1.0;
        // x=100 lies inside both boxes; the earlier box in list order wins
        assert_eq!(editor.hit_test(100.0, y), Some(first));
        // A miss returns None and passes through
        assert_eq!(editor.hit_test(500.0, y), None);
    }

    #[test]
    fn test_pointer_down_chooses_operation_by_zone() {
        let (_, mut editor, _) = one_note_setup();
        let y = mid_y(&editor);

        // Box is 80 wide, so the handle is min(80*0.15, 10) = 10
        assert!(editor.pointer_down(85.0, y)); // Within 10 of the left edge
        assert_eq!(editor.active_op(), Some(GestureOp::StretchLeft));
        editor.pointer_up();

        assert!(editor.pointer_down(155.0, y)); // Within 10 of the right edge
        assert_eq!(editor.active_op(), Some(GestureOp::StretchRight));
        editor.pointer_up();

        assert!(editor.pointer_down(120.0, y)); // Interior
        assert_eq!(editor.active_op(), Some(GestureOp::Translate));
    }

    #[test]
    fn test_move_without_selection_is_noop() {
        let (mut melody, mut editor, id) = one_note_setup();
        editor.pointer_moved(&mut melody, 500.0, 500.0);
        let note = melody.note(id).unwrap();
        assert!((note.onset - 1.0).abs() < EPS);
        assert_eq!(note.pitch, 60);
    }

    #[test]
    fn test_translate_moves_note_and_box() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(120.0, y);
        editor.pointer_moved(&mut melody, 160.0, y); // +40 device = +0.5 beat

        let note = melody.note(id).unwrap();
        assert!((note.onset - 1.5).abs() < EPS);
        assert!((editor.boxes()[0].rect.x - 120.0).abs() < EPS);
        assert_eq!(editor.pending_deltas().0, 0.0);
    }

    #[test]
    fn test_translate_past_zero_clamps_and_keeps_residual() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(120.0, y);
        // Drag left by 2.0 beats' worth (160 device units): onset would go
        // to -1.0, so it clamps at 0 and one beat's worth stays pending
        editor.pointer_moved(&mut melody, -40.0, y);

        let note = melody.note(id).unwrap();
        assert!((note.onset - 0.0).abs() < EPS);
        assert!((editor.pending_deltas().0 - (-80.0)).abs() < EPS);

        // A small rightward move must NOT move the note: it only eats into
        // the pending residue
        editor.pointer_moved(&mut melody, 0.0, y);
        let note = melody.note(id).unwrap();
        assert!((note.onset - 0.0).abs() < EPS);
        assert!((editor.pending_deltas().0 - (-40.0)).abs() < EPS);

        // Crossing back over the original offset starts the note moving at
        // exactly the crossing point
        editor.pointer_moved(&mut melody, 50.0, y);
        let note = melody.note(id).unwrap();
        assert!((note.onset - 0.125).abs() < EPS); // 10 device units past
        assert_eq!(editor.pending_deltas().0, 0.0);
    }

    #[test]
    fn test_translate_rows_consume_and_keep_remainder() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(120.0, y);
        // Drag down 20 device units: more than one 16-unit row, less than
        // two. One row is consumed (pitch down one), 4 units stay pending.
        editor.pointer_moved(&mut melody, 120.0, y + 20.0);

        let note = melody.note(id).unwrap();
        assert_eq!(note.pitch, 59);
        assert!((editor.pending_deltas().1 - 4.0).abs() < EPS);
        // The box followed the pitch row
        assert!((editor.boxes()[0].rect.y - editor.metrics().y_from_pitch(59)).abs() < EPS);

        // Dragging up 40 units: pending becomes -36, two rows back up
        editor.pointer_moved(&mut melody, 120.0, y - 20.0);
        let note = melody.note(id).unwrap();
        assert_eq!(note.pitch, 61);
        assert!((editor.pending_deltas().1 - (-4.0)).abs() < EPS);
    }

    #[test]
    fn test_translate_pitch_clamps_at_range_edge() {
        let note = Note::new(127, 1.0, 1.0);
        let id = note.id;
        let mut melody = Melody::new(vec![note], 120.0, None);
        let mut editor = RollEditor::new(RollMetrics::default());
        editor.open_melody(&melody);

        let y = editor.metrics().y_from_pitch(127) + 8.0;
        editor.pointer_down(120.0, y);
        editor.pointer_moved(&mut melody, 120.0, y - 40.0); // Two rows up

        // Already at the top: pitch stays, rows stay pending
        let note = melody.note(id).unwrap();
        assert_eq!(note.pitch, 127);
        assert!((editor.pending_deltas().1 - (-40.0)).abs() < EPS);
    }

    #[test]
    fn test_stretch_right_grows_and_clamps() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(155.0, y); // Right handle
        editor.pointer_moved(&mut melody, 195.0, y); // +0.5 beat

        let note = melody.note(id).unwrap();
        assert!((note.duration - 1.5).abs() < EPS);
        assert!((editor.boxes()[0].rect.width - 120.0).abs() < EPS);

        // Now shrink far past the minimum: duration clamps to 1/16 and the
        // unusable portion of the drag is left as a negative residue
        editor.pointer_moved(&mut melody, 195.0 - 160.0, y); // -2.0 beats
        let note = melody.note(id).unwrap();
        assert!((note.duration - 0.0625).abs() < EPS);
        // Wanted -2.0 beats from 1.5: only -(1.5 - 0.0625) was usable,
        // leaving -(0.5625) beats = -45 device units pending
        assert!((editor.pending_deltas().0 - (-45.0)).abs() < EPS);
    }

    #[test]
    fn test_stretch_left_clamp_scenario() {
        // Note {onset: 2.0, duration: 0.5}, left-edge drag of +1.0 beat:
        // duration clamps to 1/16, onset lands at 2.4375, and the residue
        // is the 0.5625 beats of drag the note could not absorb.
        let note = Note::new(60, 2.0, 0.5);
        let id = note.id;
        let mut melody = Melody::new(vec![note], 120.0, None);
        let mut editor = RollEditor::new(RollMetrics::default());
        editor.open_melody(&melody);

        let y = editor.metrics().y_from_pitch(60) + 8.0;
        // Box spans 160..200, width 40: handle is min(40*0.15, 10) = 6
        assert!(editor.pointer_down(161.0, y));
        assert_eq!(editor.active_op(), Some(GestureOp::StretchLeft));

        editor.pointer_moved(&mut melody, 241.0, y); // +80 device = +1.0 beat

        let note = melody.note(id).unwrap();
        assert!((note.onset - 2.4375).abs() < EPS);
        assert!((note.duration - 0.0625).abs() < EPS);
        let metrics = *editor.metrics();
        assert!((editor.pending_deltas().0 - metrics.x_from_beats(0.5625)).abs() < EPS);

        // The box tracks the mutated note
        assert!((editor.boxes()[0].rect.x - metrics.x_from_beats(2.4375)).abs() < EPS);
        assert!((editor.boxes()[0].rect.width - metrics.x_from_beats(0.0625)).abs() < EPS);
    }

    #[test]
    fn test_stretch_left_grow() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(85.0, y); // Left handle
        editor.pointer_moved(&mut melody, 45.0, y); // -0.5 beat: grow leftward

        let note = melody.note(id).unwrap();
        assert!((note.onset - 0.5).abs() < EPS);
        assert!((note.duration - 1.5).abs() < EPS);
        assert_eq!(editor.pending_deltas().0, 0.0);
    }

    #[test]
    fn test_delete_selected_clears_both_lists() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);

        editor.pointer_down(120.0, y);
        editor.pointer_up(); // Selection survives the gesture

        assert!(editor.delete_selected(&mut melody));
        assert!(melody.note(id).is_none());
        assert!(editor.boxes().is_empty());
        assert_eq!(editor.selected(), None);

        // Nothing selected anymore: delete is a no-op
        assert!(!editor.delete_selected(&mut melody));
    }

    #[test]
    fn test_delete_tolerates_drifted_lists() {
        let (mut melody, mut editor, id) = one_note_setup();
        let y = mid_y(&editor);
        editor.pointer_down(120.0, y);

        // The note vanished from the melody behind the editor's back
        melody.remove_note(id);
        assert!(editor.delete_selected(&mut melody));
        assert!(editor.boxes().is_empty());
    }

    #[test]
    fn test_shortest_note_rejects_invalid() {
        let mut editor = RollEditor::new(RollMetrics::default());
        let prior = editor.shortest_note();
        assert!(!editor.set_shortest_note(0.0));
        assert!(!editor.set_shortest_note(-1.0));
        assert_eq!(editor.shortest_note(), prior);
        assert!(editor.set_shortest_note(0.125));
        assert_eq!(editor.shortest_note(), 0.125);
    }

    #[test]
    fn test_refresh_regenerates_boxes() {
        let (mut melody, mut editor, _) = one_note_setup();
        melody.add_note(Note::new(72, 3.0, 1.0));
        editor.refresh(&melody);
        assert_eq!(editor.boxes().len(), 2);
        let rect = editor.boxes()[1].rect;
        assert!((rect.x - 240.0).abs() < EPS);
        assert!((rect.y - editor.metrics().y_from_pitch(72)).abs() < EPS);
    }
}
