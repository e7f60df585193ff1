use flow_message::{Button, ChatPayload, Media};
use screenflow::config::FlowConfig;
use screenflow::demo;
use screenflow::flow::Flow;
use screenflow::gateway::{ChatInbound, ChatJsonGateway, ChatOutbound};
use screenflow::processor::{Processor, ProcessorBuilder};
use screenflow::session::InMemorySessionStore;

fn processor(flow: Flow) -> Processor<ChatJsonGateway> {
    ProcessorBuilder::chat(FlowConfig::default())
        .use_gateway(ChatJsonGateway::new("whatsapp"))
        .use_session_store(InMemorySessionStore::new())
        .run(flow, "main")
        .unwrap()
}

fn message(from: &str, text: &str) -> ChatInbound {
    ChatInbound {
        message_id: format!("wamid.{text}"),
        from: from.into(),
        contact_name: Some("Ama".into()),
        text: Some(text.into()),
        timestamp: None,
        location: None,
        media: None,
    }
}

async fn send(processor: &Processor<ChatJsonGateway>, text: &str) -> ChatOutbound {
    processor.handle(message("233200000001", text)).await.unwrap()
}

fn text(body: &str) -> ChatPayload {
    ChatPayload::Text { body: body.into() }
}

fn button(id: &str, title: &str) -> Button {
    Button {
        id: id.into(),
        title: title.into(),
    }
}

#[tokio::test]
async fn test_demo_over_chat() {
    let processor = processor(demo::flow());

    // The opening message only starts the conversation.
    let reply = send(&processor, "hi").await;
    assert_eq!(reply.to, "+233200000001");
    assert_eq!(reply.payload, text("Welcome! What is your name?"));

    let reply = send(&processor, "Kofi").await;
    assert_eq!(
        reply.payload,
        ChatPayload::Buttons {
            body: "Hi Kofi, choose a plan".into(),
            buttons: vec![button("basic", "Basic"), button("plus", "Plus"), button("family", "Family")],
            header: None,
        }
    );

    let reply = send(&processor, "family").await;
    assert_eq!(reply.payload, text("How old are you?"));

    let reply = send(&processor, "17").await;
    assert_eq!(
        reply.payload,
        text("You must be 18 or older to subscribe.\n\nHow old are you?")
    );

    let reply = send(&processor, "40").await;
    match reply.payload {
        ChatPayload::Buttons { body, buttons, .. } => {
            assert!(body.starts_with("Terms:"));
            assert_eq!(buttons, vec![button("Yes", "Yes"), button("No", "No")]);
        }
        other => panic!("expected buttons, got {other:?}"),
    }

    let reply = send(&processor, "no").await;
    assert_eq!(reply.payload, text("No problem, Kofi. Nothing was charged."));

    // The conversation ended, so the next message starts a new one.
    let reply = send(&processor, "hello again").await;
    assert_eq!(reply.payload, text("Welcome! What is your name?"));
}

#[tokio::test]
async fn test_senders_have_separate_conversations() {
    let processor = processor(demo::flow());

    processor.handle(message("233200000001", "hi")).await.unwrap();
    processor.handle(message("233200000001", "Ama")).await.unwrap();

    let reply = processor.handle(message("233200000002", "hi")).await.unwrap();
    assert_eq!(reply.payload, text("Welcome! What is your name?"));

    let reply = processor.handle(message("233200000001", "basic")).await.unwrap();
    assert_eq!(reply.payload, text("How old are you?"));
}

#[tokio::test]
async fn test_many_choices_render_as_list() {
    let flow = Flow::new("regions").action("main", |app| {
        let region: String = app.screen("region", |p| {
            p.select(
                "Pick your region",
                ["Ashanti", "Bono", "Central", "Eastern", "Greater Accra", "Northern", "Volta"],
            )
            .read()
        })?;
        app.say(format!("Region set to {region}."))
    });
    let processor = processor(flow);

    let reply = send(&processor, "hi").await;
    match reply.payload {
        ChatPayload::List { body, button_text, sections } => {
            assert_eq!(body, "Pick your region");
            assert_eq!(button_text, "Choose");
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0].title, "Options");
            assert_eq!(sections[0].rows.len(), 7);
            assert_eq!(sections[0].rows[4].id, "Greater Accra");
        }
        other => panic!("expected a list, got {other:?}"),
    }

    let reply = send(&processor, "volta").await;
    assert_eq!(reply.payload, text("Region set to Volta."));
}

#[tokio::test]
async fn test_media_prompt_renders_header() {
    let flow = Flow::new("menu").action("main", |app| {
        let dish: String = app.screen("dish", |p| {
            p.select("Today's menu", [("jollof", "Jollof"), ("waakye", "Waakye")])
                .media(Media::image("https://example.com/menu.jpg"))
                .read()
        })?;
        app.say(format!("One {dish} coming up."))
    });
    let processor = processor(flow);

    let reply = send(&processor, "hi").await;
    assert_eq!(
        reply.payload,
        ChatPayload::Buttons {
            body: "Today's menu".into(),
            buttons: vec![button("jollof", "Jollof"), button("waakye", "Waakye")],
            header: Some(Media::image("https://example.com/menu.jpg")),
        }
    );

    let reply = send(&processor, "waakye").await;
    assert_eq!(reply.payload, text("One waakye coming up."));
}
