//! OSM PBF reader built on `osmpbf`.

use camino::Utf8Path;
use geotap_core::{Member, OsmKind};
use osmpbf::{Element, ElementReader, RelMemberType};

use super::{OsmError, OsmHandler, collect_tags};

pub(super) fn read(path: &Utf8Path, handler: &mut OsmHandler) -> Result<(), OsmError> {
    let decode_error = |source| OsmError::Pbf {
        path: path.to_owned(),
        source,
    };
    let reader = ElementReader::from_path(path).map_err(decode_error)?;
    reader
        .for_each(|element| match element {
            Element::Node(node) => {
                handler.node(node.id(), Some((node.lon(), node.lat())), collect_tags(node.tags()));
            }
            Element::DenseNode(node) => {
                handler.node(node.id(), Some((node.lon(), node.lat())), collect_tags(node.tags()));
            }
            Element::Way(way) => {
                handler.way(way.id(), way.refs().collect(), collect_tags(way.tags()));
            }
            Element::Relation(relation) => {
                let members = relation
                    .members()
                    .map(|member| Member {
                        kind: member_kind(&member.member_type),
                        reference: member.member_id,
                        role: member.role().unwrap_or_default().to_owned(),
                    })
                    .collect();
                handler.relation(relation.id(), members, collect_tags(relation.tags()));
            }
        })
        .map_err(decode_error)
}

const fn member_kind(kind: &RelMemberType) -> OsmKind {
    match kind {
        RelMemberType::Node => OsmKind::Node,
        RelMemberType::Way => OsmKind::Way,
        RelMemberType::Relation => OsmKind::Relation,
    }
}
