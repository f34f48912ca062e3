use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{Chapter, Question, QuestionWithChoices};

/// An entity that participates in the original/draft pairing: a row is
/// either an original (`draft_of` = None) or a shadow draft holding pending
/// edits for the original it points at.
pub trait Versioned {
    fn entity_id(&self) -> Uuid;
    fn draft_of(&self) -> Option<Uuid>;
}

impl Versioned for Chapter {
    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn draft_of(&self) -> Option<Uuid> {
        self.draft_of
    }
}

impl Versioned for Question {
    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn draft_of(&self) -> Option<Uuid> {
        self.draft_of
    }
}

impl Versioned for QuestionWithChoices {
    fn entity_id(&self) -> Uuid {
        self.question.id
    }

    fn draft_of(&self) -> Option<Uuid> {
        self.question.draft_of
    }
}

/// Collapse a mixed set of originals and drafts to one representative per
/// logical entity: the draft when one is pending, otherwise the original.
///
/// Drafts always pass through; an original is dropped only when its id is
/// shadowed by some draft in the same set. Input order is preserved, so a
/// position-ordered fetch stays position-ordered. Pure function, no store
/// access.
pub fn collapse<T: Versioned>(rows: Vec<T>) -> Vec<T> {
    let shadowed: HashSet<Uuid> = rows.iter().filter_map(|r| r.draft_of()).collect();

    rows.into_iter()
        .filter(|row| row.draft_of().is_some() || !shadowed.contains(&row.entity_id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: Uuid, draft_of: Option<Uuid>, title: &str) -> Chapter {
        Chapter {
            id,
            course_id: Uuid::new_v4(),
            position: 1,
            title: title.to_string(),
            description: None,
            video_url: None,
            published: draft_of.is_none(),
            draft_of,
        }
    }

    #[test]
    fn test_draft_shadows_original() {
        let original_id = Uuid::new_v4();
        let original = chapter(original_id, None, "Intro");
        let draft = chapter(Uuid::new_v4(), Some(original_id), "Intro v2");

        let collapsed = collapse(vec![original, draft]);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].title, "Intro v2");
        assert_eq!(collapsed[0].draft_of, Some(original_id));
    }

    #[test]
    fn test_originals_without_drafts_pass_through() {
        let a = chapter(Uuid::new_v4(), None, "Alkanes");
        let b = chapter(Uuid::new_v4(), None, "Alkenes");

        let collapsed = collapse(vec![a.clone(), b.clone()]);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].id, a.id);
        assert_eq!(collapsed[1].id, b.id);
    }

    #[test]
    fn test_mixed_set_keeps_one_row_per_logical_entity() {
        let shadowed_id = Uuid::new_v4();
        let rows = vec![
            chapter(Uuid::new_v4(), None, "Acids and Bases"),
            chapter(shadowed_id, None, "Stereochemistry"),
            chapter(Uuid::new_v4(), Some(shadowed_id), "Stereochemistry (edited)"),
            chapter(Uuid::new_v4(), None, "Substitution Reactions"),
        ];

        let collapsed = collapse(rows);
        assert_eq!(collapsed.len(), 3);
        assert!(collapsed.iter().all(|c| c.id != shadowed_id));
        assert_eq!(collapsed[1].title, "Stereochemistry (edited)");
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let original_id = Uuid::new_v4();
        let rows = vec![
            chapter(original_id, None, "Resonance"),
            chapter(Uuid::new_v4(), Some(original_id), "Resonance v2"),
            chapter(Uuid::new_v4(), None, "Aromaticity"),
        ];

        let once = collapse(rows);
        let ids: Vec<Uuid> = once.iter().map(|c| c.id).collect();
        let twice = collapse(once);
        let ids_again: Vec<Uuid> = twice.iter().map(|c| c.id).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_dangling_draft_passes_through() {
        // A draft whose original was deleted out-of-band still shows up;
        // bulk promotion is where it gets reported as failed.
        let draft = chapter(Uuid::new_v4(), Some(Uuid::new_v4()), "Orphan");
        let collapsed = collapse(vec![draft.clone()]);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].id, draft.id);
    }

    #[test]
    fn test_empty_set() {
        let collapsed = collapse(Vec::<Chapter>::new());
        assert!(collapsed.is_empty());
    }
}
