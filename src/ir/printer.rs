//! Text and Graphviz renderings of a method graph.

use std::fmt::{self, Write};

use crate::{
    ir::{BasicBlock, MethodGraph, Op, Value, ValueKind},
    utils::escape_dot,
};

fn write_list<T: fmt::Display>(out: &mut impl Write, items: impl IntoIterator<Item = T>) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{item}")?;
    }
    Ok(())
}

fn write_payload(out: &mut impl Write, op: &Op) -> fmt::Result {
    match op {
        Op::PackedSwitch { start, entries } => write!(out, "[{start}, +{entries}]"),
        Op::TryBoundary { kind } => write!(out, "[{kind}]"),
        Op::Condition(c) => write!(out, "[{c}]"),
        Op::Binary(b) => write!(out, "[{b}]"),
        Op::Unary(u) => write!(out, "[{u}]"),
        Op::Compare { bias } => write!(out, "[bias {bias}]"),
        Op::ArraySet { expected } => write!(out, "[{expected}]"),
        Op::InstanceFieldGet { field, volatile }
        | Op::InstanceFieldSet { field, volatile, .. }
        | Op::StaticFieldGet { field, volatile }
        | Op::StaticFieldSet { field, volatile, .. } => {
            write!(out, "[field {field}{}]", if *volatile { " volatile" } else { "" })
        }
        Op::UnresolvedInstanceFieldGet { field }
        | Op::UnresolvedInstanceFieldSet { field, .. }
        | Op::UnresolvedStaticFieldGet { field }
        | Op::UnresolvedStaticFieldSet { field, .. } => write!(out, "[field {field}]"),
        Op::Invoke(invoke) => write!(out, "[{} method {}]", invoke.kind, invoke.method),
        Op::NewInstance { type_index, .. }
        | Op::NewArray { type_index }
        | Op::LoadClass { type_index, .. }
        | Op::BoundType { type_index } => write!(out, "[type {type_index}]"),
        Op::LoadString { string_index } => write!(out, "[string {string_index}]"),
        Op::InstanceOf { kind } | Op::CheckCast { kind } => write!(out, "[{kind}]"),
        Op::Monitor(kind) => write!(out, "[{kind}]"),
        _ => Ok(()),
    }
}

impl MethodGraph {
    /// Writes one value as `v7: Phi(v3, v5) i32 [users]`.
    fn write_value(&self, out: &mut impl Write, value: &Value) -> fmt::Result {
        write!(out, "{}: ", value.id)?;
        match &value.kind {
            ValueKind::Constant(c) => write!(out, "{c}")?,
            ValueKind::Parameter { index, is_this, .. } => {
                write!(out, "Parameter[{index}{}]", if *is_this { ", this" } else { "" })?;
            }
            ValueKind::Phi(info) => {
                write!(out, "Phi[r{}{}]", info.register, if info.live { "" } else { ", dead" })?;
            }
            ValueKind::Operation(op) => {
                out.write_str(op.name())?;
                write_payload(out, op)?;
            }
        }
        if !value.inputs().is_empty() {
            out.write_char('(')?;
            write_list(out, value.inputs())?;
            out.write_char(')')?;
        }
        write!(out, " {}", value.ty)?;
        if value.has_uses() {
            out.write_str(" [")?;
            write_list(out, value.uses().iter().map(|u| u.user))?;
            out.write_char(']')?;
        }
        Ok(())
    }

    fn write_block_header(&self, out: &mut impl Write, block: &BasicBlock) -> fmt::Result {
        write!(out, "BasicBlock {}", block.id.index())?;
        if let Some(offset) = block.offset {
            write!(out, " @{offset:#x}")?;
        }
        if block.is_entry() {
            out.write_str(" (entry)")?;
        } else if block.is_exit() {
            out.write_str(" (exit)")?;
        } else if block.is_catch_block() {
            out.write_str(" (catch)")?;
        }
        if !block.predecessors().is_empty() {
            out.write_str(", pred: ")?;
            write_list(out, block.predecessors().iter().map(|b| b.index()))?;
        }
        if !block.successors().is_empty() {
            out.write_str(", succ: ")?;
            write_list(out, block.successors().iter().map(|b| b.index()))?;
        }
        Ok(())
    }

    /// Generates a Graphviz DOT rendering of the graph.
    ///
    /// Blocks become boxes listing their phis and instructions; exceptional
    /// edges out of try boundaries are dashed.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional graph label, typically the method name
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();
        dot.push_str("digraph MethodGraph {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for block in self.blocks() {
            let mut header = String::new();
            let _ = self.write_block_header(&mut header, block);
            let mut label = escape_dot(&header);
            label.push_str("\\l");
            for id in block.phis().iter().chain(block.instructions()) {
                let mut line = String::new();
                let _ = self.write_value(&mut line, self.value(*id));
                label.push_str(&escape_dot(&line));
                label.push_str("\\l");
            }
            let style = if block.is_entry() {
                ", style=filled, fillcolor=lightgreen"
            } else if block.is_exit() {
                ", style=filled, fillcolor=lightcoral"
            } else if block.is_synthetic() {
                ", style=dashed"
            } else {
                ""
            };
            let _ = writeln!(dot, "    {} [label=\"{label}\"{style}];", block.id);
        }
        dot.push('\n');

        for block in self.blocks() {
            for (position, succ) in block.successors().iter().enumerate() {
                let style = if block.is_try_boundary() && position > 0 {
                    " [style=dashed, color=red]"
                } else {
                    ""
                };
                let _ = writeln!(dot, "    {} -> {succ}{style};", block.id);
            }
        }
        dot.push_str("}\n");
        dot
    }
}

impl fmt::Display for MethodGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.blocks() {
            self.write_block_header(f, block)?;
            writeln!(f)?;
            for id in block.phis().iter().chain(block.instructions()) {
                f.write_str("  ")?;
                self.write_value(f, self.value(*id))?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
