use std::sync::Arc;

use crate::application::ports::AnswerGenerator;
use crate::application::services::StreamRelay;

pub struct AppState<G>
where
    G: AnswerGenerator,
{
    pub stream_relay: Arc<StreamRelay<G>>,
}

impl<G> AppState<G>
where
    G: AnswerGenerator,
{
    pub fn new(stream_relay: Arc<StreamRelay<G>>) -> Self {
        Self { stream_relay }
    }
}

impl<G> Clone for AppState<G>
where
    G: AnswerGenerator,
{
    fn clone(&self) -> Self {
        Self {
            stream_relay: Arc::clone(&self.stream_relay),
        }
    }
}
