use super::{Entity, EntityService};
use crate::models::{NewStaff, RecordId, Staff, StaffPatch};

pub type StaffService = EntityService<Staff>;

impl Entity for Staff {
    type Draft = NewStaff;
    type Patch = StaffPatch;

    const KIND: &'static str = "staff";
    const FIELDS: &'static [&'static str] = &[
        "Id",
        "Name",
        "Tags",
        "Owner",
        "CreatedOn",
        "CreatedBy",
        "ModifiedOn",
        "ModifiedBy",
    ];

    fn id(&self) -> RecordId {
        self.id
    }
}
