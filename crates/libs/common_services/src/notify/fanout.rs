use crate::database::face::Face;
use crate::database::person::Person;
use crate::database::photo::{Photo, PhotoStatus};
use crate::database::{IdentityStore, StoredPhoto};
use crate::messaging::MessagingSession;
use crate::notify::LiveEvent;
use common_types::ContactHandle;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const LIVE_CHANNEL_CAPACITY: usize = 100;

/// What one fan-out achieved. Failures here never fail the operation that triggered it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub live_receivers: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
}

/// Fills `{name}` and `{url}` in a message template.
#[must_use]
pub fn render_message(template: &str, name: Option<&str>, url: &str) -> String {
    template
        .replace("{name}", name.unwrap_or("there"))
        .replace("{url}", url)
}

/// Distributes committed changes to live viewers and matched guests.
///
/// The live broadcast and the chat messages are independent; either may fail
/// without affecting the other.
#[derive(Clone)]
pub struct NotificationFanout {
    live: broadcast::Sender<Arc<LiveEvent>>,
    store: Arc<dyn IdentityStore>,
    messaging: Arc<MessagingSession>,
    message_template: String,
}

impl NotificationFanout {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        messaging: Arc<MessagingSession>,
        message_template: String,
    ) -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            live,
            store,
            messaging,
            message_template,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveEvent>> {
        self.live.subscribe()
    }

    #[must_use]
    pub fn messaging(&self) -> &Arc<MessagingSession> {
        &self.messaging
    }

    /// A new event photo was committed: show it live, then tell every linked guest.
    pub async fn photo_ready(&self, stored: &StoredPhoto) -> FanoutReport {
        let mut report = FanoutReport {
            live_receivers: self.broadcast(LiveEvent::NewPhotoReady {
                photo: stored.photo.clone(),
                faces: stored.faces.clone(),
            }),
            ..FanoutReport::default()
        };

        let person_ids: BTreeSet<i64> = stored.faces.iter().filter_map(|f| f.person_id).collect();
        if person_ids.is_empty() {
            return report;
        }
        let ids: Vec<i64> = person_ids.into_iter().collect();
        match self.store.persons_by_ids(&ids).await {
            Ok(persons) => {
                for person in &persons {
                    self.message(person, &stored.photo.url, &mut report).await;
                }
            }
            Err(e) => {
                warn!("Cannot look up guests of photo {}: {e}", stored.photo.id);
                report.messages_failed += ids.len();
            }
        }
        report
    }

    pub fn photo_deleted(&self, photo_id: i64) -> FanoutReport {
        FanoutReport {
            live_receivers: self.broadcast(LiveEvent::PhotoDeleted { photo_id }),
            ..FanoutReport::default()
        }
    }

    /// `faces` were just linked to `person`; sends them each event photo they appear in.
    pub async fn faces_tagged(&self, person: &Person, faces: &[Face]) -> FanoutReport {
        if faces.is_empty() {
            return FanoutReport::default();
        }
        let photo_ids: BTreeSet<i64> = faces.iter().map(|f| f.photo_id).collect();
        let mut report = FanoutReport {
            live_receivers: self.broadcast(LiveEvent::FacesTagged {
                person: person.clone(),
                face_ids: faces.iter().map(|f| f.id).collect(),
                photo_ids: photo_ids.iter().copied().collect(),
            }),
            ..FanoutReport::default()
        };

        if person.contact_handle.is_none() {
            return report;
        }
        for photo_id in photo_ids {
            match self.store.find_photo(photo_id).await {
                Ok(Some(photo)) if is_event_photo(&photo) => {
                    self.message(person, &photo.url, &mut report).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Cannot look up photo {photo_id} for notification: {e}");
                    report.messages_failed += 1;
                }
            }
        }
        report
    }

    fn broadcast(&self, event: LiveEvent) -> usize {
        // No subscribers is fine; live delivery is best effort.
        self.live.send(Arc::new(event)).unwrap_or(0)
    }

    async fn message(&self, person: &Person, url: &str, report: &mut FanoutReport) {
        let Some(handle) = person.contact_handle.as_deref() else {
            return;
        };
        let contact = match ContactHandle::parse(handle) {
            Ok(contact) => contact,
            Err(e) => {
                warn!("Person {} has an unusable contact handle: {e}", person.id);
                report.messages_failed += 1;
                return;
            }
        };
        let text = render_message(&self.message_template, person.name.as_deref(), url);
        match self.messaging.send(&contact, &text).await {
            Ok(()) => {
                debug!("Notified person {} about {url}", person.id);
                report.messages_sent += 1;
            }
            Err(e) => {
                warn!("Could not notify person {}: {e}", person.id);
                report.messages_failed += 1;
            }
        }
    }
}

fn is_event_photo(photo: &Photo) -> bool {
    photo.status == PhotoStatus::Completed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        assert_eq!(
            render_message("Hi {name}, you are in {url}", Some("Ada"), "http://x/1.jpg"),
            "Hi Ada, you are in http://x/1.jpg"
        );
        assert_eq!(render_message("Hi {name}", None, ""), "Hi there");
    }
}
