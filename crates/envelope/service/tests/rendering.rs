//! Render jobs triggered by completion.

mod common;

use common::*;
use envelope_engine::NewEnvelope;
use envelope_service::{templates, PDF_CONTENT_TYPE};
use envelope_store::DocumentStorage;
use envelope_types::*;
use std::time::Duration;

/// A sent single-signer envelope over a two-page document.
async fn sent_lease(h: &Harness) -> (EnvelopeId, DocumentKey) {
    let stored = h
        .service
        .upload_document(&h.owner, sample_pdf(2))
        .await
        .unwrap();
    let key = stored.key.clone();
    let summary = h
        .service
        .create_envelope(
            &h.owner,
            NewEnvelope {
                title: "Lease".into(),
                document_key: stored.key,
                workflow: WorkflowType::Sequential,
                recipients: vec![NewRecipient {
                    order: 1,
                    role: RecipientRole::Signer,
                    name: "Ada Lovelace".into(),
                    email: "ada@client.test".into(),
                }],
                fields: vec![signature_field(0, 1, 70.0)],
                expires_at: None,
            },
        )
        .await
        .unwrap();
    h.service.send(&h.owner, summary.id).await.unwrap();
    (summary.id, key)
}

async fn sign(h: &Harness) {
    let token = h.token_for("ada@client.test").await;
    h.service.complete(&token, drawn_capture()).await.unwrap();
}

#[tokio::test]
async fn completion_renders_once_and_retry_is_a_no_op() {
    let h = harness();
    let (id, _) = sent_lease(&h).await;
    sign(&h).await;

    let rendered = h.wait_for_render(id).await;
    h.wait_for_render_queue(id).await;
    assert_eq!(rendered.certificate.page_count, 3);
    assert_eq!(rendered.certificate.signature_count, 1);

    let bytes = h.service.download(&h.owner, id).await.unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(bytes.len() as u64, rendered.size_bytes);

    assert!(!h.service.retry_render(&h.owner, id).await.unwrap());
    // A stray enqueue finds the output attached and leaves it alone.
    h.service.renders().enqueue(id);
    h.wait_for_render_queue(id).await;
    let again = h.service.get_envelope(&h.owner, id).await.unwrap();
    assert_eq!(again.rendered.as_ref(), Some(&rendered));

    let trail = h.service.audit_trail(&h.owner, id).await.unwrap();
    assert_eq!(
        trail.iter().filter(|r| r.stage == "document_rendered").count(),
        1
    );
}

#[tokio::test]
async fn corrupted_source_lands_in_the_failed_set_until_retried() {
    let h = harness();
    let (id, key) = sent_lease(&h).await;
    // The stored source goes bad between upload and completion.
    h.documents
        .put(b"%PDF-1.7\nthis is not a pdf body".to_vec(), &key, PDF_CONTENT_TYPE)
        .await
        .unwrap();
    sign(&h).await;

    let mut failure = None;
    for _ in 0..200 {
        failure = h.service.renders().failure(id);
        if failure.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let failure = failure.expect("render should give up");
    assert_eq!(failure.attempts, 2);
    assert_eq!(h.service.failed_renders().len(), 1);
    assert!(!h.service.renders().is_in_flight(id));

    // The envelope stays completed without output.
    let summary = h.service.get_envelope(&h.owner, id).await.unwrap();
    assert_eq!(summary.status, EnvelopeStatus::Completed);
    assert!(summary.rendered.is_none());
    assert!(matches!(
        h.service.download(&h.owner, id).await,
        Err(SigningError::NotFound(_))
    ));

    h.documents
        .put(sample_pdf(2), &key, PDF_CONTENT_TYPE)
        .await
        .unwrap();
    assert!(h.service.retry_render(&h.owner, id).await.unwrap());
    assert!(h.service.renders().failure(id).is_none());
    let rendered = h.wait_for_render(id).await;
    assert_eq!(rendered.certificate.page_count, 3);
    assert!(h.service.failed_renders().is_empty());
}

#[tokio::test]
async fn only_completed_envelopes_can_be_re_rendered() {
    let h = harness();
    let id = h
        .sent(
            WorkflowType::Sequential,
            &[(RecipientRole::Signer, 1, "ada@client.test")],
        )
        .await;
    assert!(matches!(
        h.service.retry_render(&h.owner, id).await,
        Err(SigningError::Conflict(_))
    ));
}

#[tokio::test]
async fn failing_notifier_does_not_block_transitions() {
    let h = harness();
    h.notifier.set_failing(true);
    let id = h
        .sent(
            WorkflowType::Sequential,
            &[(RecipientRole::Signer, 1, "ada@client.test")],
        )
        .await;
    assert_eq!(h.status(id).await, EnvelopeStatus::Sent);

    h.notifier.set_failing(false);
    let summary = h.service.get_envelope(&h.owner, id).await.unwrap();
    let ada = summary.recipients[0].id;
    h.service.resend(&h.owner, id, ada).await.unwrap();
    let mut resent = Vec::new();
    for _ in 0..200 {
        resent = h
            .notifier
            .sent_to("ada@client.test", templates::RECIPIENT_ACTIVATED)
            .into_iter()
            .filter(|n| n.data["resend"] == true)
            .collect();
        if !resent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(resent.len(), 1);
}
