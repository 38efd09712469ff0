use crate::domain::models::{ChatMessage, ChatRole, ChatSession, Entry, Verse};
use crate::infrastructure::error::JournalError;
use crate::infrastructure::rest_store::ChatStore;
use crate::infrastructure::text_generation::{ChatTurn, GenerationRequest, TextGenerationClient};
use serde_json::Value;
use std::sync::Arc;

/// Recent entries shared with the mentor as conversation context.
pub const CONTEXT_ENTRY_LIMIT: usize = 8;
/// Session titles are cut to this many characters of the opening message.
pub const SESSION_TITLE_LIMIT: usize = 30;

const VERSE_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1499209974431-9dac3adaf471?auto=format&fit=crop&q=80&w=800";
const VERSE_ERROR_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1438109491414-7198515b166b?auto=format&fit=crop&q=80&w=800";

pub fn context_summary(entries: &[Entry]) -> String {
    entries
        .iter()
        .take(CONTEXT_ENTRY_LIMIT)
        .map(|entry| {
            format!(
                "Título: {}\nConteúdo: {}\nCategoria: {}",
                entry.title, entry.content, entry.category
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn session_title(first_message: &str) -> String {
    let mut title: String = first_message.chars().take(SESSION_TITLE_LIMIT).collect();
    if first_message.chars().count() > SESSION_TITLE_LIMIT {
        title.push_str("...");
    }
    title
}

fn system_prompt(user_name: &str, entries: &[Entry]) -> String {
    format!(
        "Você é um Mentor Espiritual sábio. Nome do usuário: {user_name}.\n\
         Contexto: {}.\n\
         Seja direto, use negrito nas chaves, cite a Bíblia.",
        context_summary(entries)
    )
}

/// How one exchange ended: a persisted reply, or the mentor unreachable
/// after the user turn was already stored.
#[derive(Debug, Clone)]
pub enum MentorTurn {
    Replied(ChatMessage),
    Unavailable { reason: String },
}

#[derive(Debug, Clone)]
pub struct MentorReply {
    /// Always set, including when generation fails: the session exists and
    /// holds the user turn, and follow-ups must stay bound to it.
    pub session_id: String,
    /// Set when the exchange opened a new session.
    pub session: Option<ChatSession>,
    pub turn: MentorTurn,
}

pub struct MentorService<S: ChatStore, G: TextGenerationClient> {
    chat_store: Arc<S>,
    generation: Arc<G>,
}

impl<S: ChatStore, G: TextGenerationClient> MentorService<S, G> {
    pub fn new(chat_store: Arc<S>, generation: Arc<G>) -> Self {
        Self {
            chat_store,
            generation,
        }
    }

    /// Persists the user turn, asks the mentor, and persists the reply.
    /// A generation failure is not an error: the session id still comes
    /// back so the caller can keep the conversation bound to the user
    /// turn that already landed.
    pub async fn send_message(
        &self,
        access_token: &str,
        user_id: &str,
        session_id: Option<&str>,
        user_name: &str,
        context_entries: &[Entry],
        text: &str,
    ) -> Result<MentorReply, JournalError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(JournalError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let (session_id, created_session) = match session_id {
            Some(existing) => (existing.to_string(), None),
            None => {
                let created = self
                    .chat_store
                    .create_session(access_token, user_id, &session_title(text))
                    .await?;
                (created.id.clone(), Some(created))
            }
        };

        // History is captured before the new user turn; that turn is sent
        // as the prompt itself.
        let history = self
            .chat_store
            .list_messages(access_token, &session_id)
            .await?
            .into_iter()
            .map(|message| ChatTurn {
                role: message.role,
                text: message.content,
            })
            .collect();

        self.chat_store
            .append_message(access_token, user_id, &session_id, ChatRole::User, text)
            .await?;

        let generated = self
            .generation
            .generate(GenerationRequest {
                system_prompt: Some(system_prompt(user_name, context_entries)),
                history,
                prompt: text.to_string(),
                json_response: false,
            })
            .await;

        let reply_text = match generated {
            Ok(text) => text,
            Err(JournalError::Generation(reason)) => {
                return Ok(MentorReply {
                    session_id,
                    session: created_session,
                    turn: MentorTurn::Unavailable { reason },
                });
            }
            Err(error) => return Err(error),
        };

        let message = self
            .chat_store
            .append_message(
                access_token,
                user_id,
                &session_id,
                ChatRole::Model,
                &reply_text,
            )
            .await?;

        Ok(MentorReply {
            session_id,
            session: created_session,
            turn: MentorTurn::Replied(message),
        })
    }

    /// Never fails: a generation or parse error falls back to Salmos 23:1.
    pub async fn verse_of_the_day(&self, theme: Option<&str>) -> Verse {
        let prompt = match theme {
            Some(theme) => format!(
                "Gere um versículo bíblico do dia baseado no tema \"{theme}\". \
                 Responda em Português do Brasil."
            ),
            None => "Gere um versículo bíblico poderoso e reconfortante para o dia de hoje. \
                     Responda em Português do Brasil."
                .to_string(),
        };

        let generated = self
            .generation
            .generate(GenerationRequest {
                system_prompt: None,
                history: Vec::new(),
                prompt,
                json_response: true,
            })
            .await
            .ok()
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok());

        match generated {
            Some(data) => Verse {
                text: data
                    .get("text")
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .unwrap_or(
                        "Alegrem-se na esperança, sejam pacientes na tribulação, \
                         perseverem na oração.",
                    )
                    .to_string(),
                reference: data
                    .get("reference")
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .unwrap_or("Romanos 12:12")
                    .to_string(),
                image_url: Some(VERSE_IMAGE_URL.to_string()),
            },
            None => Verse {
                text: "O Senhor é o meu pastor; nada me faltará.".to_string(),
                reference: "Salmos 23:1".to_string(),
                image_url: Some(VERSE_ERROR_IMAGE_URL.to_string()),
            },
        }
    }

    /// Short prayer text for a category; falls back to a fixed line on error.
    pub async fn suggest_prayer(&self, category: &str) -> String {
        let prompt = format!(
            "Forneça um pequeno texto de oração moderna para a categoria: {category}. \
             Responda em Português do Brasil. Máximo de 30 palavras."
        );
        match self
            .generation
            .generate(GenerationRequest {
                system_prompt: None,
                history: Vec::new(),
                prompt,
                json_response: false,
            })
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(_) => "Senhor, guia meus pensamentos e meu coração hoje.".to_string(),
        }
    }

    pub async fn list_sessions(&self, access_token: &str) -> Result<Vec<ChatSession>, JournalError> {
        self.chat_store.list_sessions(access_token).await
    }

    pub async fn rename_session(
        &self,
        access_token: &str,
        session_id: &str,
        title: &str,
    ) -> Result<(), JournalError> {
        if title.trim().is_empty() {
            return Err(JournalError::InvalidInput(
                "session title must not be empty".to_string(),
            ));
        }
        self.chat_store
            .rename_session(access_token, session_id, title)
            .await
    }

    pub async fn delete_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<(), JournalError> {
        self.chat_store.delete_session(access_token, session_id).await
    }

    pub async fn load_messages(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, JournalError> {
        self.chat_store.list_messages(access_token, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct FakeChatStore {
        sessions: Mutex<Vec<ChatSession>>,
        messages: Mutex<Vec<ChatMessage>>,
        next_id: AtomicU64,
        fail_appends: AtomicBool,
    }

    #[async_trait]
    impl ChatStore for FakeChatStore {
        async fn list_sessions(&self, _access_token: &str) -> Result<Vec<ChatSession>, JournalError> {
            Ok(self.sessions.lock().expect("session lock poisoned").clone())
        }

        async fn create_session(
            &self,
            _access_token: &str,
            _user_id: &str,
            title: &str,
        ) -> Result<ChatSession, JournalError> {
            let session = ChatSession {
                id: format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                title: title.to_string(),
                created_at: Utc::now(),
            };
            self.sessions
                .lock()
                .expect("session lock poisoned")
                .push(session.clone());
            Ok(session)
        }

        async fn rename_session(
            &self,
            _access_token: &str,
            session_id: &str,
            title: &str,
        ) -> Result<(), JournalError> {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            if let Some(session) = sessions
                .iter_mut()
                .find(|candidate| candidate.id == session_id)
            {
                session.title = title.to_string();
            }
            Ok(())
        }

        async fn delete_session(
            &self,
            _access_token: &str,
            session_id: &str,
        ) -> Result<(), JournalError> {
            self.sessions
                .lock()
                .expect("session lock poisoned")
                .retain(|candidate| candidate.id != session_id);
            Ok(())
        }

        async fn list_messages(
            &self,
            _access_token: &str,
            session_id: &str,
        ) -> Result<Vec<ChatMessage>, JournalError> {
            Ok(self
                .messages
                .lock()
                .expect("message lock poisoned")
                .iter()
                .filter(|message| message.session_id == session_id)
                .cloned()
                .collect())
        }

        async fn append_message(
            &self,
            _access_token: &str,
            _user_id: &str,
            session_id: &str,
            role: ChatRole,
            content: &str,
        ) -> Result<ChatMessage, JournalError> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(JournalError::Store("append rejected".to_string()));
            }
            let message = ChatMessage {
                id: format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            };
            self.messages
                .lock()
                .expect("message lock poisoned")
                .push(message.clone());
            Ok(message)
        }
    }

    #[derive(Debug)]
    struct FakeTextGeneration {
        responses: Mutex<VecDeque<Result<String, JournalError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
        calls: AtomicUsize,
    }

    impl FakeTextGeneration {
        fn with_responses(responses: Vec<Result<String, JournalError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerationClient for FakeTextGeneration {
        async fn generate(&self, request: GenerationRequest) -> Result<String, JournalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .expect("request lock poisoned")
                .push(request);
            self.responses
                .lock()
                .expect("response lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok("Paz seja convosco.".to_string()))
        }
    }

    fn sample_entry(title: &str) -> Entry {
        Entry {
            id: format!("row-{title}"),
            title: title.to_string(),
            content: "Obrigado pelo dia.".to_string(),
            category: "GRATIDÃO".to_string(),
            date: Utc::now(),
            is_favorite: false,
            images: Vec::new(),
        }
    }

    fn service(
        generation: FakeTextGeneration,
    ) -> (
        MentorService<FakeChatStore, FakeTextGeneration>,
        Arc<FakeChatStore>,
        Arc<FakeTextGeneration>,
    ) {
        let store = Arc::new(FakeChatStore::default());
        let generation = Arc::new(generation);
        (
            MentorService::new(Arc::clone(&store), Arc::clone(&generation)),
            store,
            generation,
        )
    }

    #[test]
    fn session_titles_are_truncated_with_an_ellipsis() {
        assert_eq!(session_title("Oi"), "Oi");
        let long = "a".repeat(45);
        let title = session_title(&long);
        assert_eq!(title.chars().count(), SESSION_TITLE_LIMIT + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn context_summary_takes_only_the_first_entries() {
        let entries: Vec<Entry> = (0..12).map(|i| sample_entry(&format!("E{i}"))).collect();
        let summary = context_summary(&entries);
        assert!(summary.contains("Título: E0"));
        assert!(summary.contains("Título: E7"));
        assert!(!summary.contains("Título: E8"));
    }

    #[tokio::test]
    async fn first_message_opens_a_session_and_persists_both_turns() {
        let (mentor, store, generation) =
            service(FakeTextGeneration::with_responses(vec![Ok(
                "Confie no Senhor.".to_string()
            )]));

        let reply = mentor
            .send_message(
                "token",
                "user-1",
                None,
                "Ana",
                &[sample_entry("Manhã")],
                "Como posso orar melhor?",
            )
            .await
            .expect("send");

        let session = reply.session.expect("new session");
        assert_eq!(session.title, "Como posso orar melhor?");
        let MentorTurn::Replied(message) = reply.turn else {
            panic!("expected a reply");
        };
        assert_eq!(message.role, ChatRole::Model);
        assert_eq!(message.content, "Confie no Senhor.");

        let messages = store
            .list_messages("token", &reply.session_id)
            .await
            .expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);

        let requests = generation.requests.lock().expect("request lock poisoned");
        let request = &requests[0];
        assert!(request
            .system_prompt
            .as_deref()
            .is_some_and(|prompt| prompt.contains("Ana") && prompt.contains("Título: Manhã")));
        assert!(request.history.is_empty());
    }

    #[tokio::test]
    async fn later_messages_reuse_the_session_and_carry_history() {
        let (mentor, _store, generation) = service(FakeTextGeneration::with_responses(vec![
            Ok("Primeira resposta.".to_string()),
            Ok("Segunda resposta.".to_string()),
        ]));

        let first = mentor
            .send_message("token", "user-1", None, "Ana", &[], "Primeira pergunta")
            .await
            .expect("first send");
        let second = mentor
            .send_message(
                "token",
                "user-1",
                Some(&first.session_id),
                "Ana",
                &[],
                "Segunda pergunta",
            )
            .await
            .expect("second send");

        assert!(second.session.is_none());
        assert_eq!(second.session_id, first.session_id);

        let requests = generation.requests.lock().expect("request lock poisoned");
        let history = &requests[1].history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "Primeira pergunta");
        assert_eq!(history[1].text, "Primeira resposta.");
    }

    #[tokio::test]
    async fn generation_failure_keeps_the_user_turn_and_the_session_binding() {
        let (mentor, store, _generation) =
            service(FakeTextGeneration::with_responses(vec![Err(
                JournalError::Generation("offline".to_string()),
            )]));

        let reply = mentor
            .send_message("token", "user-1", None, "Ana", &[], "Sem rede")
            .await
            .expect("unreachable mentor is not a command error");

        let MentorTurn::Unavailable { reason } = reply.turn else {
            panic!("expected the unavailable turn");
        };
        assert_eq!(reason, "offline");

        // The created session is surfaced, not orphaned: follow-ups can
        // address the conversation that holds the persisted user turn.
        let sessions = store.list_sessions("token").await.expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(reply.session_id, sessions[0].id);
        assert_eq!(
            reply.session.as_ref().map(|created| created.id.as_str()),
            Some(sessions[0].id.as_str())
        );

        let messages = store
            .list_messages("token", &reply.session_id)
            .await
            .expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn store_failures_still_surface_as_errors() {
        let (mentor, store, _generation) =
            service(FakeTextGeneration::with_responses(vec![Ok(
                "Resposta.".to_string()
            )]));
        store.fail_appends.store(true, Ordering::SeqCst);

        let result = mentor
            .send_message("token", "user-1", None, "Ana", &[], "Olá")
            .await;
        assert!(matches!(result, Err(JournalError::Store(_))));
    }

    #[tokio::test]
    async fn verse_of_the_day_falls_back_on_generation_error() {
        let (mentor, _store, _generation) =
            service(FakeTextGeneration::with_responses(vec![Err(
                JournalError::Generation("offline".to_string()),
            )]));

        let verse = mentor.verse_of_the_day(None).await;
        assert_eq!(verse.reference, "Salmos 23:1");
        assert!(verse.image_url.is_some());
    }

    #[tokio::test]
    async fn verse_of_the_day_fills_missing_fields() {
        let (mentor, _store, generation) = service(FakeTextGeneration::with_responses(vec![Ok(
            r#"{"text": "Tudo posso naquele que me fortalece."}"#.to_string(),
        )]));

        let verse = mentor.verse_of_the_day(Some("força")).await;
        assert_eq!(verse.text, "Tudo posso naquele que me fortalece.");
        assert_eq!(verse.reference, "Romanos 12:12");

        let requests = generation.requests.lock().expect("request lock poisoned");
        assert!(requests[0].json_response);
        assert!(requests[0].prompt.contains("força"));
    }

    #[tokio::test]
    async fn suggest_prayer_trims_the_reply_and_falls_back_on_error() {
        let (mentor, _store, _generation) = service(FakeTextGeneration::with_responses(vec![
            Ok("  Senhor, obrigado.  ".to_string()),
            Err(JournalError::Generation("offline".to_string())),
        ]));

        assert_eq!(mentor.suggest_prayer("GRATIDÃO").await, "Senhor, obrigado.");
        assert_eq!(
            mentor.suggest_prayer("GRATIDÃO").await,
            "Senhor, guia meus pensamentos e meu coração hoje."
        );
    }
}
