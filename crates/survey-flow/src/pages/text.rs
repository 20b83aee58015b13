use serde::Deserialize;

use super::{PageContext, PageFactory, PageUnit, parse_props};
use crate::error::Result;
use crate::shell::Node;
use crate::spec::PageDescriptor;

/// Body text: one paragraph or several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Body {
    One(String),
    Many(Vec<String>),
}

impl Default for Body {
    fn default() -> Self {
        Body::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextProps {
    pub title: Option<String>,
    pub body: Body,
}

/// Static heading and paragraphs. Always valid, records nothing.
pub struct TextPage {
    ctx: PageContext,
    props: TextProps,
}

impl TextPage {
    pub fn new(ctx: PageContext) -> Result<Self> {
        let props = parse_props(&ctx.descriptor, &ctx.key)?;
        Ok(Self { ctx, props })
    }
}

impl PageUnit for TextPage {
    fn render(&mut self) -> Result<()> {
        let mount = &self.ctx.mount;
        if let Some(title) = &self.props.title {
            mount.push(Node::Heading(title.clone()));
        }
        match &self.props.body {
            Body::One(text) => mount.push(Node::Paragraph(text.clone())),
            Body::Many(paragraphs) => {
                for paragraph in paragraphs {
                    mount.push(Node::Paragraph(paragraph.clone()));
                }
            }
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.ctx.mount.clear();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextFactory;

impl PageFactory for TextFactory {
    fn create(&self, ctx: PageContext) -> Result<Box<dyn PageUnit>> {
        Ok(Box::new(TextPage::new(ctx)?))
    }

    fn check(&self, descriptor: &PageDescriptor, key: &str) -> Result<()> {
        parse_props::<TextProps>(descriptor, key).map(|_| ())
    }
}
