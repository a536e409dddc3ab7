//! Field layout store: the placed fields of one envelope.

use envelope_types::{Field, FieldId, FieldKind, FieldValue, RecipientId};
use serde::{Deserialize, Serialize};

/// Ordered collection of fields owned by an envelope.
///
/// Insertion order is preserved; the renderer draws in this order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldLayout {
    fields: Vec<Field>,
}

impl FieldLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Read-only projection filtered to one recipient.
    pub fn for_recipient(&self, recipient_id: RecipientId) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.recipient_id == recipient_id)
            .collect()
    }

    pub fn has_kind_for(&self, recipient_id: RecipientId, kind: FieldKind) -> bool {
        self.fields
            .iter()
            .any(|f| f.recipient_id == recipient_id && f.kind == kind)
    }

    /// Required fields of the recipient that still block completion.
    ///
    /// Signature-like fields are excluded: completion fills them. A required
    /// checkbox only counts once it is checked.
    pub fn unsatisfied_required(&self, recipient_id: RecipientId) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.recipient_id == recipient_id && f.required)
            .filter(|f| !f.kind.is_signature_like())
            .filter(|f| !matches!(f.value, Some(ref v) if *v != FieldValue::Checked(false)))
            .collect()
    }

    pub(crate) fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub(crate) fn get_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    pub(crate) fn iter_mut_for(
        &mut self,
        recipient_id: RecipientId,
    ) -> impl Iterator<Item = &mut Field> {
        self.fields
            .iter_mut()
            .filter(move |f| f.recipient_id == recipient_id)
    }

    pub(crate) fn remove(&mut self, id: FieldId) -> Option<Field> {
        let idx = self.fields.iter().position(|f| f.id == id)?;
        Some(self.fields.remove(idx))
    }

    pub(crate) fn remove_for_recipient(&mut self, recipient_id: RecipientId) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.recipient_id != recipient_id);
        before - self.fields.len()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let n = self.fields.len();
        self.fields.clear();
        n
    }
}
