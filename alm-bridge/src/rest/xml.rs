// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing ALM entity XML.
//!
//! ```xml
//! <Entity Type="run">
//!   <Fields>
//!     <Field Name="name"><Value>Run_3-7_9-5-2</Value></Field>
//!   </Fields>
//! </Entity>
//! ```

use crate::{entity::EntityFields, errors::EntityXmlError};
use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};

static ENTITY_TAG: &str = "Entity";
static FIELDS_TAG: &str = "Fields";
static FIELD_TAG: &str = "Field";
static VALUE_TAG: &str = "Value";

/// Serializes an entity of the given type.
pub(crate) fn write_entity(
    entity_type: &str,
    fields: &EntityFields,
) -> Result<Vec<u8>, EntityXmlError> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::Start(
        BytesStart::new(ENTITY_TAG).with_attributes([("Type", entity_type)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new(FIELDS_TAG)))?;
    for (name, value) in fields.iter() {
        writer.write_event(Event::Start(
            BytesStart::new(FIELD_TAG).with_attributes([("Name", name)]),
        ))?;
        writer.write_event(Event::Start(BytesStart::new(VALUE_TAG)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(VALUE_TAG)))?;
        writer.write_event(Event::End(BytesEnd::new(FIELD_TAG)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(FIELDS_TAG)))?;
    writer.write_event(Event::End(BytesEnd::new(ENTITY_TAG)))?;

    Ok(writer.into_inner())
}

/// Writes the ALM authentication request body.
pub(crate) fn write_authentication(user: &str, password: &str) -> Result<Vec<u8>, EntityXmlError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .create_element("alm-authentication")
        .write_inner_content(|writer| {
            writer
                .create_element("user")
                .write_text_content(BytesText::new(user))?;
            writer
                .create_element("password")
                .write_text_content(BytesText::new(password))?;
            Ok::<_, quick_xml::Error>(())
        })?;
    Ok(writer.into_inner())
}

/// Parses the first entity in a document.
///
/// Multi-valued fields keep their first value; a field without a value maps to an empty string.
pub(crate) fn read_entity(xml: &str) -> Result<EntityFields, EntityXmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut fields = EntityFields::new();
    let mut in_entity = false;
    let mut current_field: Option<(String, Option<String>)> = None;
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"Entity" => in_entity = true,
                b"Field" if in_entity => {
                    current_field = Some((field_name(&start)?, None));
                }
                b"Value" if current_field.is_some() => in_value = true,
                _ => {}
            },
            Event::Empty(start) => match start.name().as_ref() {
                b"Field" if in_entity => {
                    fields.insert(field_name(&start)?, "");
                }
                b"Value" => {
                    if let Some((_, value @ None)) = &mut current_field {
                        *value = Some(String::new());
                    }
                }
                _ => {}
            },
            Event::Text(text) if in_value => {
                if let Some((_, value @ None)) = &mut current_field {
                    *value = Some(text.unescape()?.into_owned());
                }
            }
            Event::CData(data) if in_value => {
                if let Some((_, value @ None)) = &mut current_field {
                    *value = Some(String::from_utf8_lossy(&data).into_owned());
                }
            }
            Event::End(end) => match end.name().as_ref() {
                b"Value" => {
                    // An element like <Value></Value> produces no text event.
                    if let Some((_, value @ None)) = &mut current_field {
                        *value = Some(String::new());
                    }
                    in_value = false;
                }
                b"Field" => {
                    if let Some((name, value)) = current_field.take() {
                        fields.insert(name, value.unwrap_or_default());
                    }
                }
                b"Entity" => return Ok(fields),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if in_entity {
        Ok(fields)
    } else {
        Err(EntityXmlError::NoEntity)
    }
}

fn field_name(start: &BytesStart<'_>) -> Result<String, EntityXmlError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"Name" {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Err(EntityXmlError::FieldWithoutName)
}
