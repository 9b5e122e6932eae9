use super::{Entity, EntityService};
use crate::models::{NewTask, RecordId, Task, TaskPatch};

pub type TaskService = EntityService<Task>;

impl Entity for Task {
    type Draft = NewTask;
    type Patch = TaskPatch;

    const KIND: &'static str = "task";
    const FIELDS: &'static [&'static str] = &[
        "Id",
        "Name",
        "Tags",
        "Owner",
        "Status",
        "CreatedOn",
        "CreatedBy",
        "ModifiedOn",
        "ModifiedBy",
    ];

    fn id(&self) -> RecordId {
        self.id
    }
}
