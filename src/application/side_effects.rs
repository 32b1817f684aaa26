use crate::domain::playback::{CompletionDispatcher, CompletionEvent};
use crate::infrastructure::activity_log::ActivityRegistrar;
use crate::infrastructure::feedback::{FeedbackChannel, FeedbackKind, FeedbackMessage};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

pub fn completion_message(event: &CompletionEvent) -> FeedbackMessage {
    if event.cycle_completed {
        FeedbackMessage {
            kind: FeedbackKind::Success,
            text: format!("Cycle \"{}\" complete! Great study session.", event.cycle_name),
        }
    } else {
        FeedbackMessage {
            kind: FeedbackKind::Info,
            text: format!("Finished {}. Nice work!", event.subject_name),
        }
    }
}

pub struct SpawningDispatcher<A, F>
where
    A: ActivityRegistrar + 'static,
    F: FeedbackChannel + 'static,
{
    registrar: Arc<A>,
    feedback: Arc<F>,
    runtime: Handle,
}

impl<A, F> SpawningDispatcher<A, F>
where
    A: ActivityRegistrar + 'static,
    F: FeedbackChannel + 'static,
{
    pub fn new(registrar: Arc<A>, feedback: Arc<F>, runtime: Handle) -> Self {
        Self {
            registrar,
            feedback,
            runtime,
        }
    }
}

impl<A, F> CompletionDispatcher for SpawningDispatcher<A, F>
where
    A: ActivityRegistrar + 'static,
    F: FeedbackChannel + 'static,
{
    fn dispatch(&self, event: CompletionEvent) {
        let message = completion_message(&event);
        let user_id = event.user_id;

        let registrar = Arc::clone(&self.registrar);
        self.runtime.spawn(async move {
            if let Err(error) = registrar.register_activity(&user_id).await {
                warn!(%user_id, %error, "activity registration failed");
            }
        });

        let feedback = Arc::clone(&self.feedback);
        self.runtime.spawn(async move {
            if let Err(error) = feedback.deliver(&message).await {
                warn!(%error, "completion feedback delivery failed");
            }
        });
    }
}
