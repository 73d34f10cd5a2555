use crate::api::upload::interfaces::{NotificationSummary, UploadedFile};
use crate::database::person::Person;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertGuestRequest {
    pub name: String,
    /// Phone-like contact handle; separators are ignored.
    pub phone: String,
    #[serde(default, alias = "seatNumber")]
    pub seat: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertRequest {
    pub guests: Vec<UpsertGuestRequest>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedGuest {
    /// Position of the entry in the request.
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertResponse {
    pub upserted: Vec<Person>,
    pub rejected: Vec<RejectedGuest>,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub seat: Option<String>,
    pub snapshots: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub person: Person,
    /// Reference faces stored for this guest, one per usable snapshot.
    pub count: usize,
    /// Event faces that were linked to the guest during registration.
    pub tagged_faces: usize,
    pub matched_photo_ids: Vec<i64>,
    pub notifications: NotificationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roster_entries_accept_seat_number() {
        let guest: UpsertGuestRequest = serde_json::from_value(json!({
            "name": "Ada",
            "phone": "85261234567",
            "seatNumber": "T5",
        }))
        .expect("valid guest");
        assert_eq!(guest.seat.as_deref(), Some("T5"));

        let bulk: BulkUpsertRequest = serde_json::from_value(json!({
            "guests": [
                {"name": "Ada", "phone": "85261234567", "seat": "T1"},
                {"name": "Bob", "phone": "85261234568", "seatNumber": "T2"},
                {"name": "Cy", "phone": "85261234569"},
            ],
        }))
        .expect("valid roster");
        let seats: Vec<_> = bulk.guests.iter().map(|g| g.seat.as_deref()).collect();
        assert_eq!(seats, [Some("T1"), Some("T2"), None]);
    }
}
