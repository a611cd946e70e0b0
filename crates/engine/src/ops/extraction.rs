use crate::{
    FieldError, Identity, ResultEngine, TransactionDraft, build_prompt, normalize,
    parse_extraction,
};

use super::Engine;

impl Engine {
    /// Send `text` to the text generator once and return its raw answer.
    pub async fn extract(&self, identity: &Identity, text: &str) -> ResultEngine<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FieldError::new("text", "must not be empty").into());
        }

        let prompt = build_prompt(text);
        let raw = self.generator.complete(&prompt).await.inspect_err(|err| {
            tracing::error!(owner = %identity.user_id(), "extraction failed: {err}");
        })?;
        tracing::debug!(owner = %identity.user_id(), raw = %raw, "model response");
        Ok(raw)
    }

    /// Turn free text into normalized candidates for the caller to review.
    ///
    /// Nothing is stored: candidates only become records when submitted
    /// through [`Engine::ingest_batch`] or [`Engine::ingest_each`].
    pub async fn extract_candidates(
        &self,
        identity: &Identity,
        text: &str,
    ) -> ResultEngine<Vec<TransactionDraft>> {
        let raw = self.extract(identity, text).await?;
        let candidates: Vec<TransactionDraft> = parse_extraction(&raw)?
            .into_iter()
            .map(normalize)
            .collect();

        tracing::info!(
            owner = %identity.user_id(),
            count = candidates.len(),
            "extracted candidates"
        );
        Ok(candidates)
    }
}
