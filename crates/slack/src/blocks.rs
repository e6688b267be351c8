use serde::Serialize;

pub const GREETING_COLOR: &str = "#4af030";
pub const NEUTRAL_COLOR: &str = "#3d3d3d";
pub const WARNING_COLOR: &str = "#e8a33d";

pub const ARTICLE_FEEDBACK_ACTION_ID: &str = "answer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<TextObject>,
}

impl OptionObject {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { text: TextObject::mrkdwn(label), value: value.into(), description: None }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(TextObject::mrkdwn(description));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Checkboxes { action_id: String, options: Vec<OptionObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<BlockElement>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Legacy secondary attachment: colored bar, pretext, titled fields and
/// optional Block Kit blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl Attachment {
    pub fn field(&self, title: &str) -> Option<&str> {
        self.fields.iter().find(|field| field.title == title).map(|field| field.value.as_str())
    }
}

/// Body shared by `chat.postMessage` and slash-command acknowledgements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl MessagePayload {
    pub fn from_attachment(attachment: Attachment) -> Self {
        Self { text: attachment.text.clone(), attachments: vec![attachment] }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }
}

pub struct AttachmentBuilder {
    text: String,
    pretext: Option<String>,
    color: String,
    fields: Vec<AttachmentField>,
    blocks: Vec<Block>,
}

impl AttachmentBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pretext: None,
            color: NEUTRAL_COLOR.to_owned(),
            fields: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn pretext(mut self, pretext: impl Into<String>) -> Self {
        self.pretext = Some(pretext.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn field(mut self, title: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AttachmentField { title: title.into(), value: value.into(), short: false });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn build(self) -> Attachment {
        Attachment {
            pretext: self.pretext,
            text: self.text,
            color: self.color,
            fields: self.fields,
            blocks: self.blocks,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<BlockElement>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn checkboxes(
        &mut self,
        action_id: impl Into<String>,
        options: Vec<OptionObject>,
    ) -> &mut Self {
        self.accessory = Some(BlockElement::Checkboxes { action_id: action_id.into(), options });
        self
    }

    fn build(self) -> (TextObject, Option<BlockElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

fn with_context_fields(builder: AttachmentBuilder, initializer: &str, date: &str) -> AttachmentBuilder {
    builder.field("Date", date).field("Initializer", initializer)
}

pub fn mention_reply(user_name: &str, text: &str, date: &str) -> Attachment {
    let builder = if text.to_lowercase().contains("hello") {
        AttachmentBuilder::new(format!("Hello {user_name}"))
            .pretext("Greetings")
            .color(GREETING_COLOR)
    } else {
        AttachmentBuilder::new(format!("How can I help you {user_name}"))
            .pretext("How can I be of service?")
            .color(NEUTRAL_COLOR)
    };

    with_context_fields(builder, user_name, date).build()
}

pub fn hello_command_reply(user_name: &str, text: &str, date: &str) -> Attachment {
    let builder = AttachmentBuilder::new(format!("Hello {user_name}! You said: {text}"))
        .color(GREETING_COLOR);
    with_context_fields(builder, user_name, date).build()
}

pub fn article_feedback_prompt() -> Attachment {
    AttachmentBuilder::new("Rate the tutorial")
        .color(GREETING_COLOR)
        .section("article.feedback.question.v1", |section| {
            section.mrkdwn("Did you think this article was helpful?").checkboxes(
                ARTICLE_FEEDBACK_ACTION_ID,
                vec![
                    OptionObject::new("yes", "Yes").description("Did you Enjoy it?"),
                    OptionObject::new("no", "No").description("Did you Dislike it?"),
                ],
            );
        })
        .build()
}

pub fn unknown_command_reply(command: &str) -> Attachment {
    AttachmentBuilder::new(format!(
        "Unknown command `{command}`. Try `/hello <text>` or `/was-this-article-useful`."
    ))
    .pretext("Unknown command")
    .color(WARNING_COLOR)
    .build()
}
