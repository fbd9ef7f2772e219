use serde::Serialize;

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
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub text: TextObject,
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), action_id: action_id.into(), value: None, style: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: TextObject,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Divider,
    Actions {
        elements: Vec<ButtonElement>,
    },
    Context {
        elements: Vec<TextObject>,
    },
}

impl Block {
    pub fn mrkdwn_section(text: impl Into<String>) -> Self {
        Self::Section { text: TextObject::mrkdwn(text), fields: Vec::new() }
    }
}

/// A message ready to post: fallback text for notifications plus its blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { elements: builder.build() });
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    /// Adds a bold label followed by its value as two consecutive fields.
    pub fn field(&mut self, label: &str, value: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(format!("*{label}*")));
        self.fields.push(TextObject::mrkdwn(value));
        self
    }

    pub fn build(self) -> Block {
        Block::Section {
            text: self.text.unwrap_or_else(|| TextObject::plain("")),
            fields: self.fields,
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Block, ButtonElement, ButtonStyle, MessageBuilder};

    #[test]
    fn message_serializes_to_block_kit_shape() {
        let message = MessageBuilder::new("fallback")
            .section(|section| {
                section.mrkdwn("*Beacon*").field("Channel", "#beacon");
            })
            .divider()
            .actions(|actions| {
                actions.button(
                    ButtonElement::new("in_person", "Add My Name")
                        .value("yes")
                        .style(ButtonStyle::Primary),
                );
            })
            .context(|context| {
                context.mrkdwn("hint");
            })
            .build();

        let value = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(
            value,
            json!({
                "text": "fallback",
                "blocks": [
                    {
                        "type": "section",
                        "text": {"type": "mrkdwn", "text": "*Beacon*"},
                        "fields": [
                            {"type": "mrkdwn", "text": "*Channel*"},
                            {"type": "mrkdwn", "text": "#beacon"}
                        ]
                    },
                    {"type": "divider"},
                    {
                        "type": "actions",
                        "elements": [{
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Add My Name"},
                            "action_id": "in_person",
                            "value": "yes",
                            "style": "primary"
                        }]
                    },
                    {
                        "type": "context",
                        "elements": [{"type": "mrkdwn", "text": "hint"}]
                    }
                ]
            })
        );
    }

    #[test]
    fn section_without_fields_omits_the_key() {
        let value = serde_json::to_value(Block::mrkdwn_section("hello")).expect("serialize");
        assert_eq!(value, json!({"type": "section", "text": {"type": "mrkdwn", "text": "hello"}}));
    }
}
