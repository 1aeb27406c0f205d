// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental plain-text rendering of session snapshots.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use weft_core::{Message, MessagePart, PartType};
use weft_reconciler::Notice;
use weft_session::SessionSnapshot;

/// Prints only what changed since the previous snapshot.
///
/// Streaming text is written as a suffix of what was already printed. When
/// an authoritative resync rewrites a part, the whole part is printed again.
pub struct Renderer<W: Write> {
    out: W,
    headers: HashSet<String>,
    printed: HashMap<String, String>,
    tools: HashSet<String>,
    approvals: HashSet<String>,
    topup_shown: bool,
    balance: Option<f64>,
    queue_length: usize,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            headers: HashSet::new(),
            printed: HashMap::new(),
            tools: HashSet::new(),
            approvals: HashSet::new(),
            topup_shown: false,
            balance: None,
            queue_length: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        for message in snapshot.messages.iter() {
            self.render_message(message)?;
        }

        let current: HashSet<String> = snapshot
            .approvals
            .iter()
            .map(|a| a.call_id.clone())
            .collect();
        for approval in snapshot.approvals.iter() {
            if !self.approvals.contains(&approval.call_id) {
                writeln!(
                    self.out,
                    "\n? approval required: {} ({})",
                    approval.tool_name, approval.call_id
                )?;
            }
        }
        self.approvals = current;

        match (&snapshot.topup.pending, self.topup_shown) {
            (Some(pending), false) => {
                writeln!(
                    self.out,
                    "\n$ top-up required: ${:.2} (balance ${:.2}, suggested ${:.2})",
                    pending.amount_usd, pending.current_balance, pending.suggested_topup_usd
                )?;
                self.topup_shown = true;
            }
            (None, true) => self.topup_shown = false,
            _ => {}
        }
        if snapshot.topup.balance != self.balance {
            self.balance = snapshot.topup.balance;
            if let Some(balance) = self.balance {
                writeln!(self.out, "$ balance: ${balance:.2}")?;
            }
        }

        if snapshot.queue.queue_length != self.queue_length {
            self.queue_length = snapshot.queue.queue_length;
            if self.queue_length > 0 {
                writeln!(self.out, "\n(queued: {})", self.queue_length)?;
            }
        }

        self.out.flush()
    }

    pub fn notice(&mut self, notice: &Notice) -> io::Result<()> {
        writeln!(self.out, "\n{notice}")?;
        self.out.flush()
    }

    fn render_message(&mut self, message: &Message) -> io::Result<()> {
        if self.headers.insert(message.id.clone()) {
            writeln!(self.out, "\n[{}] {}", message.role, message.id)?;
        }
        for part in message.ordered_parts() {
            self.render_part(part)?;
        }
        Ok(())
    }

    fn render_part(&mut self, part: &MessagePart) -> io::Result<()> {
        match part.part_type {
            PartType::Text | PartType::Reasoning => {
                let text = part.text();
                let previous = self.printed.get(&part.id).map(String::as_str).unwrap_or("");
                if text == previous {
                    return Ok(());
                }
                match text.strip_prefix(previous) {
                    Some(suffix) => write!(self.out, "{suffix}")?,
                    None => write!(self.out, "\n{text}")?,
                }
                self.printed.insert(part.id.clone(), text);
            }
            PartType::ToolCall | PartType::ToolResult => {
                let name = part.tool_name.as_deref().unwrap_or("tool");
                let key = format!("{}:{}", part.id, part.part_type);
                if self.tools.insert(key) {
                    let marker = if part.ephemeral { "…" } else { "" };
                    writeln!(self.out, "\n> {} {name}{marker}", part.part_type)?;
                }
            }
            PartType::Error => {
                if self.tools.insert(part.id.clone()) {
                    writeln!(self.out, "\n! {}", part.text())?;
                }
            }
            PartType::Image | PartType::File => {}
        }
        Ok(())
    }
}
