//! OSM XML reader built on `quick-xml`.

use std::collections::HashMap;
use std::io::BufReader;

use camino::Utf8Path;
use geotap_core::{Attributes, Member, OsmKind};
use geotap_fs::open_utf8_file;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use super::{OsmError, OsmHandler};

/// Element being assembled while its children are read.
enum Pending {
    Node {
        id: i64,
        location: Option<(f64, f64)>,
        tags: Attributes,
    },
    Way {
        id: i64,
        refs: Vec<i64>,
        tags: Attributes,
    },
    Relation {
        id: i64,
        members: Vec<Member>,
        tags: Attributes,
    },
}

impl Pending {
    fn tags_mut(&mut self) -> &mut Attributes {
        match self {
            Self::Node { tags, .. } | Self::Way { tags, .. } | Self::Relation { tags, .. } => tags,
        }
    }

    fn emit(self, handler: &mut OsmHandler) {
        match self {
            Self::Node { id, location, tags } => handler.node(id, location, tags),
            Self::Way { id, refs, tags } => handler.way(id, refs, tags),
            Self::Relation { id, members, tags } => handler.relation(id, members, tags),
        }
    }
}

struct XmlReader<'a> {
    path: &'a Utf8Path,
    pending: Option<Pending>,
}

pub(super) fn read(path: &Utf8Path, handler: &mut OsmHandler) -> Result<(), OsmError> {
    let file = open_utf8_file(path).map_err(|source| OsmError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut state = XmlReader {
        path,
        pending: None,
    };
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| state.xml_error(source))?;
        match event {
            Event::Start(element) => state.open(&element, handler, false)?,
            Event::Empty(element) => state.open(&element, handler, true)?,
            Event::End(element) => {
                if matches!(element.name().as_ref(), b"node" | b"way" | b"relation")
                    && let Some(pending) = state.pending.take()
                {
                    pending.emit(handler);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

impl XmlReader<'_> {
    fn xml_error(&self, source: quick_xml::Error) -> OsmError {
        OsmError::Xml {
            path: self.path.to_owned(),
            source,
        }
    }

    fn open(
        &mut self,
        element: &BytesStart<'_>,
        handler: &mut OsmHandler,
        self_closing: bool,
    ) -> Result<(), OsmError> {
        let name = element.name();
        let pending = match name.as_ref() {
            b"node" => {
                let attrs = self.attributes(element)?;
                let location = match (attrs.get("lon"), attrs.get("lat")) {
                    (Some(lon), Some(lat)) => Some((
                        self.parse(lon, "node", "lon")?,
                        self.parse(lat, "node", "lat")?,
                    )),
                    _ => None,
                };
                Pending::Node {
                    id: self.required(&attrs, "node", "id")?,
                    location,
                    tags: Attributes::new(),
                }
            }
            b"way" => Pending::Way {
                id: self.required(&self.attributes(element)?, "way", "id")?,
                refs: Vec::new(),
                tags: Attributes::new(),
            },
            b"relation" => Pending::Relation {
                id: self.required(&self.attributes(element)?, "relation", "id")?,
                members: Vec::new(),
                tags: Attributes::new(),
            },
            b"tag" => {
                let mut attrs = self.attributes(element)?;
                let key = attrs.remove("k").ok_or_else(|| self.missing("tag", "k"))?;
                let value = attrs.remove("v").unwrap_or_default();
                if let Some(pending) = self.pending.as_mut() {
                    pending.tags_mut().insert(key, Value::String(value));
                }
                return Ok(());
            }
            b"nd" => {
                let reference = self.required(&self.attributes(element)?, "nd", "ref")?;
                if let Some(Pending::Way { refs, .. }) = self.pending.as_mut() {
                    refs.push(reference);
                }
                return Ok(());
            }
            b"member" => {
                let member = self.member(element)?;
                if let Some(Pending::Relation { members, .. }) = self.pending.as_mut() {
                    members.push(member);
                }
                return Ok(());
            }
            _ => return Ok(()),
        };

        if self_closing {
            pending.emit(handler);
        } else {
            self.pending = Some(pending);
        }
        Ok(())
    }

    fn member(&self, element: &BytesStart<'_>) -> Result<Member, OsmError> {
        let mut attrs = self.attributes(element)?;
        let kind = match attrs.get("type").map(String::as_str) {
            Some("node") => OsmKind::Node,
            Some("way") => OsmKind::Way,
            Some("relation") => OsmKind::Relation,
            _ => return Err(self.missing("member", "type")),
        };
        Ok(Member {
            kind,
            reference: self.required(&attrs, "member", "ref")?,
            role: attrs.remove("role").unwrap_or_default(),
        })
    }

    fn attributes(&self, element: &BytesStart<'_>) -> Result<HashMap<String, String>, OsmError> {
        let mut attrs = HashMap::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|err| self.xml_error(err.into()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| self.xml_error(err.into()))?
                .into_owned();
            attrs.insert(key, value);
        }
        Ok(attrs)
    }

    fn required<T: std::str::FromStr>(
        &self,
        attrs: &HashMap<String, String>,
        element: &str,
        attribute: &'static str,
    ) -> Result<T, OsmError> {
        let raw = attrs
            .get(attribute)
            .ok_or_else(|| self.missing(element, attribute))?;
        self.parse(raw, element, attribute)
    }

    fn parse<T: std::str::FromStr>(
        &self,
        raw: &str,
        element: &str,
        attribute: &'static str,
    ) -> Result<T, OsmError> {
        raw.trim()
            .parse()
            .map_err(|_| self.missing(element, attribute))
    }

    fn missing(&self, element: &str, attribute: &'static str) -> OsmError {
        OsmError::Attribute {
            path: self.path.to_owned(),
            element: element.to_owned(),
            attribute,
        }
    }
}
