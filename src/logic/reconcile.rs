//! Upgrading bare relation references to their populated form.
//!
//! Display data for assignees, labels and cover images is taken from what is
//! already in memory: a populated copy carried by the same update, the
//! entity's current relations, or the board's directory of members and
//! labels. Nothing here goes to the network.

use crate::model::{Board, Card, CardPatch, Identified, Label, Member, Relation, WorkflowSnapshot};
use itertools::Itertools;

/// Reconcile one relation set.
///
/// When `incoming` names an id both as a reference and as a populated object,
/// the populated object wins and the duplicate is dropped. Remaining
/// references are upgraded from `current`, then from `directory`.
pub fn reconcile_relations<T, F>(
    incoming: &[Relation<T>],
    current: &[Relation<T>],
    directory: F,
) -> Vec<Relation<T>>
where
    T: Identified + Clone,
    F: Fn(&str) -> Option<T>,
{
    incoming
        .iter()
        .map(|relation| relation.id())
        .unique()
        .map(|id| {
            let populated = incoming
                .iter()
                .chain(current.iter())
                .find_map(|r| r.populated().filter(|value| value.id() == id))
                .cloned()
                .or_else(|| directory(id));
            match populated {
                Some(value) => Relation::Populated(value),
                None => Relation::Reference(id.to_string()),
            }
        })
        .collect()
}

fn reconcile_single<T: Identified + Clone>(
    incoming: &Relation<T>,
    current: Option<&Relation<T>>,
) -> Relation<T> {
    if incoming.is_populated() {
        return incoming.clone();
    }
    current
        .and_then(Relation::populated)
        .filter(|value| value.id() == incoming.id())
        .map(|value| Relation::Populated(value.clone()))
        .unwrap_or_else(|| incoming.clone())
}

fn member_lookup(board: Option<&Board>) -> impl Fn(&str) -> Option<Member> + '_ {
    move |id: &str| board.and_then(|b| b.member(id)).cloned()
}

fn label_lookup(board: Option<&Board>) -> impl Fn(&str) -> Option<Label> + '_ {
    move |id: &str| board.and_then(|b| b.label(id)).cloned()
}

/// Upgrade the relation fields of an update before it is applied to `current`.
pub fn reconcile_patch(patch: &CardPatch, current: &Card, board: Option<&Board>) -> CardPatch {
    let mut patch = patch.clone();
    if let Some(assignees) = &patch.assignees {
        patch.assignees = Some(reconcile_relations(
            assignees,
            &current.assignees,
            member_lookup(board),
        ));
    }
    if let Some(labels) = &patch.labels {
        patch.labels = Some(reconcile_relations(labels, &current.labels, label_lookup(board)));
    }
    if let Some(Some(cover)) = &patch.cover_image {
        patch.cover_image = Some(Some(reconcile_single(cover, current.cover_image.as_ref())));
    }
    patch
}

/// Upgrade a card returned by the server using the local copy it replaces.
pub fn reconcile_card(mut canonical: Card, local: &Card, board: Option<&Board>) -> Card {
    canonical.assignees =
        reconcile_relations(&canonical.assignees, &local.assignees, member_lookup(board));
    canonical.labels = reconcile_relations(&canonical.labels, &local.labels, label_lookup(board));
    canonical.cover_image = canonical
        .cover_image
        .as_ref()
        .map(|cover| reconcile_single(cover, local.cover_image.as_ref()));
    canonical
}

/// Populate every card of a freshly fetched board from the board directory.
pub fn hydrate_snapshot(mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
    let board = snapshot.board.clone();
    for card in snapshot.cards_by_list.values_mut().flatten() {
        card.assignees = reconcile_relations(&card.assignees, &[], member_lookup(Some(&board)));
        card.labels = reconcile_relations(&card.labels, &[], label_lookup(Some(&board)));
    }
    snapshot
}
