// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse a `TestLog` from QtTest's XML output.

use crate::{
    errors::{ParseError, ParseErrorKind},
    report::{FunctionResult, Incident, IncidentKind, Message, TestLog},
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::time::Duration;

const TESTCASE_TAG: &[u8] = b"TestCase";
const TESTFUNCTION_TAG: &[u8] = b"TestFunction";
const INCIDENT_TAG: &[u8] = b"Incident";
const MESSAGE_TAG: &[u8] = b"Message";
const DURATION_TAG: &[u8] = b"Duration";
const DATATAG_TAG: &[u8] = b"DataTag";
const DESCRIPTION_TAG: &[u8] = b"Description";

pub(crate) fn parse_log(input: &str) -> Result<TestLog, ParseError> {
    let mut log = TestLog::default();
    if input.trim().is_empty() {
        return Ok(log);
    }

    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut parser = LogParser::default();
    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|err| ParseError::new(ParseErrorKind::Xml { position, err }))?;
        match event {
            Event::Start(start) => {
                parser.open(&start, position, &mut log)?;
                parser.stack.push(start.name().as_ref().to_vec());
            }
            Event::Empty(start) => {
                parser.open(&start, position, &mut log)?;
                parser.close(start.name().as_ref(), &mut log);
            }
            Event::End(end) => {
                parser.stack.pop();
                parser.close(end.name().as_ref(), &mut log);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| xml_error(err, position))?;
                parser.push_text(&text);
            }
            Event::CData(cdata) => {
                parser.push_text(&String::from_utf8_lossy(&cdata));
            }
            Event::Eof => {
                if let Some(open) = parser.stack.last() {
                    return Err(ParseError::new(ParseErrorKind::Truncated {
                        open_element: String::from_utf8_lossy(open).into_owned(),
                    }));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(log)
}

/// The element whose text content is currently being collected.
#[derive(Copy, Clone, Debug)]
enum TextTarget {
    IncidentDataTag,
    IncidentDescription,
    MessageDataTag,
    MessageDescription,
}

#[derive(Debug, Default)]
struct LogParser {
    stack: Vec<Vec<u8>>,
    function: Option<FunctionResult>,
    incident: Option<Incident>,
    message: Option<Message>,
    text_target: Option<TextTarget>,
}

impl LogParser {
    fn open(
        &mut self,
        start: &BytesStart<'_>,
        position: u64,
        log: &mut TestLog,
    ) -> Result<(), ParseError> {
        let name = start.name();
        let name = name.as_ref();

        let Some(parent) = self.stack.last() else {
            if name != TESTCASE_TAG {
                return Err(ParseError::new(ParseErrorKind::UnexpectedRoot {
                    found: String::from_utf8_lossy(name).into_owned(),
                }));
            }
            log.name = attribute(start, "name", position)?;
            return Ok(());
        };

        match (parent.as_slice(), name) {
            (TESTCASE_TAG, TESTFUNCTION_TAG) => {
                let function_name = attribute(start, "name", position)?
                    .ok_or_else(|| {
                        ParseError::new(ParseErrorKind::MissingFunctionName { position })
                    })?;
                self.function = Some(FunctionResult::new(function_name));
            }
            (TESTFUNCTION_TAG, INCIDENT_TAG) => {
                let kind = attribute(start, "type", position)?.unwrap_or_default();
                let mut incident = Incident::new(IncidentKind::from_type(&kind));
                incident.file = attribute(start, "file", position)?.filter(|f| !f.is_empty());
                incident.line = attribute(start, "line", position)?
                    .and_then(|line| line.parse().ok())
                    .filter(|&line| line != 0);
                self.incident = Some(incident);
            }
            (TESTFUNCTION_TAG, MESSAGE_TAG) => {
                let raw_type = attribute(start, "type", position)?.unwrap_or_default();
                self.message = Some(Message::new(raw_type, String::new()));
            }
            (TESTFUNCTION_TAG, DURATION_TAG) => {
                let msecs = attribute(start, "msecs", position)?
                    .and_then(|msecs| msecs.parse::<f64>().ok())
                    .filter(|msecs| msecs.is_finite() && *msecs >= 0.0);
                if let (Some(function), Some(msecs)) = (&mut self.function, msecs) {
                    function.duration = Some(Duration::from_nanos((msecs * 1_000_000.0).round() as u64));
                }
            }
            (INCIDENT_TAG, DATATAG_TAG) => {
                self.text_target = Some(TextTarget::IncidentDataTag);
            }
            (INCIDENT_TAG, DESCRIPTION_TAG) => {
                self.text_target = Some(TextTarget::IncidentDescription);
            }
            (MESSAGE_TAG, DATATAG_TAG) => {
                self.text_target = Some(TextTarget::MessageDataTag);
            }
            (MESSAGE_TAG, DESCRIPTION_TAG) => {
                self.text_target = Some(TextTarget::MessageDescription);
            }
            // Environment, BenchmarkResult and anything newer QtTest versions add.
            _ => {}
        }

        Ok(())
    }

    fn close(&mut self, name: &[u8], log: &mut TestLog) {
        match name {
            TESTFUNCTION_TAG => {
                if let Some(function) = self.function.take() {
                    log.functions.push(function);
                }
            }
            INCIDENT_TAG => {
                if let (Some(function), Some(incident)) = (&mut self.function, self.incident.take())
                {
                    function.incidents.push(incident);
                }
            }
            MESSAGE_TAG => {
                if let (Some(function), Some(message)) = (&mut self.function, self.message.take()) {
                    function.messages.push(message);
                }
            }
            DATATAG_TAG | DESCRIPTION_TAG => {
                self.text_target = None;
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.text_target {
            Some(TextTarget::IncidentDataTag) => {
                if let Some(incident) = &mut self.incident {
                    incident.data_tag.get_or_insert_with(String::new).push_str(text);
                }
            }
            Some(TextTarget::IncidentDescription) => {
                if let Some(incident) = &mut self.incident {
                    incident
                        .description
                        .get_or_insert_with(String::new)
                        .push_str(text);
                }
            }
            Some(TextTarget::MessageDataTag) => {
                if let Some(message) = &mut self.message {
                    message.data_tag.get_or_insert_with(String::new).push_str(text);
                }
            }
            Some(TextTarget::MessageDescription) => {
                if let Some(message) = &mut self.message {
                    message.description.push_str(text);
                }
            }
            None => {}
        }
    }
}

fn attribute(
    start: &BytesStart<'_>,
    name: &str,
    position: u64,
) -> Result<Option<String>, ParseError> {
    let attr = start
        .try_get_attribute(name)
        .map_err(|err| xml_error(quick_xml::Error::from(err), position))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error(err, position))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn xml_error(err: quick_xml::Error, position: u64) -> ParseError {
    ParseError::new(ParseErrorKind::Xml { position, err })
}
