use crate::model::{Card, CardPatch, Id, ListPatch, WorkflowList, WorkflowSnapshot};
use anyhow::Result;

/// The authoritative service behind the board. Every call may fail; the
/// engine never assumes a call succeeded until it returns `Ok`.
#[async_trait::async_trait]
pub trait RemoteWorkflowService: Send + Sync {
    /// Fetch the board together with its lists and cards.
    async fn fetch_workflow_snapshot(&self, board_id: &Id) -> Result<WorkflowSnapshot>;

    async fn create_list(&self, board_id: &Id, title: &str) -> Result<WorkflowList>;
    async fn update_list(&self, list_id: &Id, fields: &ListPatch) -> Result<WorkflowList>;
    async fn delete_list(&self, list_id: &Id) -> Result<()>;
    async fn move_list(&self, list_id: &Id, new_position: usize) -> Result<()>;

    async fn create_card(&self, list_id: &Id, title: &str, board_id: &Id) -> Result<Card>;
    async fn update_card(&self, card_id: &Id, fields: &CardPatch) -> Result<Card>;
    async fn delete_card(&self, card_id: &Id) -> Result<()>;
    /// Move a card to `dest_position` in `dest_list_id`, optionally changing
    /// its status label in the same request.
    async fn move_card(
        &self,
        card_id: &Id,
        dest_list_id: &Id,
        dest_position: usize,
        new_status: Option<&str>,
    ) -> Result<Card>;
}
