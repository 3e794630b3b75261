//! Serializes a builder tree into the compact query buffer.
//!
//! Layout is depth first with triangles last: every node block of the tree
//! precedes every triangle block, which keeps the upper tree levels packed
//! together for traversal locality. Triangle block IDs are assigned in
//! leaf encounter order and resolved through the directory.

use glam::Vec3;

use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::indexed_triangle::IndexedTriangle;

use super::builder::{BuilderNode, BuilderNodeKind};
use super::node_codec::{
    encode_node_block, DIRECTORY_OFFSET, HEADER_SIZE, LEAF_FLAG, MAX_DEPTH, NODE_SIZE,
    NUM_CHILDREN_PER_NODE, PAYLOAD_MASK,
};
use super::triangle_codec::{encode_triangle_block, TriangleHeader};

/// Counters describing a finished conversion.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub buffer_size: usize,
}

/// Converts a builder tree into the serialized form.
///
/// The builder tree is widened first so every stored node box also
/// contains the dequantized positions of its triangles; a query that
/// reaches a decoded triangle is then guaranteed to have passed its
/// bounds on the way down.
pub fn aabb_tree_to_buffer(
    vertices: &[Vec3],
    triangles: &[IndexedTriangle],
    root: &mut BuilderNode,
) -> Result<(Vec<u8>, ConvertStats), String> {
    let triangle_header = TriangleHeader::for_bounds(&root.bounds);
    widen_for_quantization(root, &triangle_header, vertices, triangles);

    let mut internal_count = 0;
    let mut leaf_count = 0;
    count_nodes(root, 1, &mut internal_count, &mut leaf_count)?;

    let nodes_offset = DIRECTORY_OFFSET + 4 + 4 * leaf_count;
    let nodes_end = nodes_offset + internal_count * NODE_SIZE;
    if nodes_end > PAYLOAD_MASK as usize {
        return Err("serialized tree exceeds the addressable buffer size".to_string());
    }

    let mut buffer = vec![0u8; nodes_end];

    // Header: root bounds, root property patched below.
    for (i, value) in [
        root.bounds.min.x,
        root.bounds.min.y,
        root.bounds.min.z,
        root.bounds.max.x,
        root.bounds.max.y,
        root.bounds.max.z,
    ]
    .into_iter()
    .enumerate()
    {
        buffer[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    triangle_header.write(&mut buffer[HEADER_SIZE..HEADER_SIZE + 24]);
    buffer[DIRECTORY_OFFSET..DIRECTORY_OFFSET + 4]
        .copy_from_slice(&(leaf_count as u32).to_le_bytes());

    // Node blocks, depth first; leaves are only collected here.
    let mut leaf_blocks: Vec<&[u32]> = Vec::with_capacity(leaf_count);
    let mut node_cursor = nodes_offset;
    let root_property = emit_node(root, &mut buffer, &mut node_cursor, &mut leaf_blocks);
    debug_assert_eq!(node_cursor, nodes_end);
    debug_assert_eq!(leaf_blocks.len(), leaf_count);
    buffer[24..28].copy_from_slice(&root_property.to_le_bytes());

    // Triangle blocks, in block ID order, offsets recorded in the directory.
    for (block_id, block_triangles) in leaf_blocks.iter().enumerate() {
        let offset = buffer.len();
        if offset > PAYLOAD_MASK as usize {
            return Err("serialized tree exceeds the addressable buffer size".to_string());
        }
        let slot = DIRECTORY_OFFSET + 4 + block_id * 4;
        buffer[slot..slot + 4].copy_from_slice(&(offset as u32).to_le_bytes());
        encode_triangle_block(vertices, triangles, block_triangles, &triangle_header, &mut buffer);
    }

    let stats = ConvertStats {
        node_count: internal_count + leaf_count,
        leaf_count,
        buffer_size: buffer.len(),
    };
    Ok((buffer, stats))
}

fn count_nodes(
    node: &BuilderNode,
    depth: usize,
    internal_count: &mut usize,
    leaf_count: &mut usize,
) -> Result<(), String> {
    if depth > MAX_DEPTH {
        return Err(format!("tree exceeds the maximum depth of {MAX_DEPTH}"));
    }
    match &node.kind {
        BuilderNodeKind::Leaf(_) => *leaf_count += 1,
        BuilderNodeKind::Internal(children) => {
            *internal_count += 1;
            for child in children.iter().flatten() {
                count_nodes(child, depth + 1, internal_count, leaf_count)?;
            }
        }
    }
    Ok(())
}

fn emit_node<'t>(
    node: &'t BuilderNode,
    buffer: &mut Vec<u8>,
    node_cursor: &mut usize,
    leaf_blocks: &mut Vec<&'t [u32]>,
) -> u32 {
    match &node.kind {
        BuilderNodeKind::Leaf(block_triangles) => {
            let block_id = leaf_blocks.len() as u32;
            leaf_blocks.push(block_triangles);
            LEAF_FLAG | block_id
        }
        BuilderNodeKind::Internal(children) => {
            let my_offset = *node_cursor;
            *node_cursor += NODE_SIZE;

            let mut child_bounds: [Option<BoundingBox>; NUM_CHILDREN_PER_NODE] = [None; 4];
            let mut properties = [0u32; NUM_CHILDREN_PER_NODE];
            for (slot, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    properties[slot] = emit_node(child, buffer, node_cursor, leaf_blocks);
                    child_bounds[slot] = Some(child.bounds);
                }
            }

            let block = encode_node_block(&child_bounds, properties);
            buffer[my_offset..my_offset + NODE_SIZE].copy_from_slice(&block);
            my_offset as u32
        }
    }
}

/// Grows every node box to also contain the quantized form of its
/// triangles' vertices.
fn widen_for_quantization(
    node: &mut BuilderNode,
    header: &TriangleHeader,
    vertices: &[Vec3],
    triangles: &[IndexedTriangle],
) {
    match &mut node.kind {
        BuilderNodeKind::Leaf(block_triangles) => {
            for &t in block_triangles.iter() {
                for &vertex_idx in &triangles[t as usize].idx {
                    let decoded = header.dequantize(header.quantize(vertices[vertex_idx as usize]));
                    node.bounds.grow(decoded);
                }
            }
        }
        BuilderNodeKind::Internal(children) => {
            let mut bounds = BoundingBox::empty();
            for child in children.iter_mut().flatten() {
                widen_for_quantization(child, header, vertices, triangles);
                bounds.merge(&child.bounds);
            }
            node.bounds = bounds;
        }
    }
}
