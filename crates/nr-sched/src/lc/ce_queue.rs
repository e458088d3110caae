use std::collections::VecDeque;

use nr_msgs::MacCe;

/// Queue of pending MAC Control Elements for one UE.
///
/// The Contention Resolution CE is a singleton pending flag held outside the
/// FIFO: it must be sent first, exactly once, before any other CE. A newly
/// indicated Timing Advance Command replaces an unsent one for the same TAG
/// instead of queueing a duplicate; all other CEs are FIFO-ordered.
pub struct CeQueue {
    con_res: Option<[u8; 6]>,
    queue: VecDeque<MacCe>,
    capacity: usize,
}

impl CeQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CE queue capacity must be positive");
        Self {
            con_res: None,
            queue: VecDeque::new(),
            capacity,
        }
    }

    pub fn set_con_res_pending(&mut self, id: [u8; 6]) {
        if self.con_res.is_some() {
            tracing::warn!("set_con_res_pending: overwriting pending ConRes CE");
        }
        self.con_res = Some(id);
    }

    pub fn con_res_pending(&self) -> bool {
        self.con_res.is_some()
    }

    /// Enqueue a CE. Returns false if the queue is full (logged, caller
    /// retries at the next opportunity).
    pub fn enqueue(&mut self, ce: MacCe) -> bool {
        assert!(
            !matches!(ce, MacCe::ConResId(_)),
            "ConRes CE goes through set_con_res_pending"
        );

        // A fresh TA command supersedes an unsent one for the same TAG
        if let MacCe::TimingAdvanceCmd { tag, .. } = ce {
            if let Some(pending) = self
                .queue
                .iter_mut()
                .find(|e| matches!(e, MacCe::TimingAdvanceCmd { tag: t, .. } if *t == tag))
            {
                tracing::debug!("enqueue: replacing unsent {} with {}", pending, ce);
                *pending = ce;
                return true;
            }
        }

        if self.queue.len() >= self.capacity {
            tracing::warn!("enqueue: CE queue full, dropping {}", ce);
            return false;
        }
        self.queue.push_back(ce);
        true
    }

    /// Take the ConRes CE if pending and it fits in `rem_bytes`
    pub fn take_con_res(&mut self, rem_bytes: u32) -> Option<MacCe> {
        let id = self.con_res?;
        let ce = MacCe::ConResId(id);
        if ce.required_bytes() > rem_bytes {
            return None;
        }
        self.con_res = None;
        Some(ce)
    }

    /// Take the next FIFO CE if one fits in `rem_bytes`.
    /// Refuses while a ConRes CE is still pending.
    pub fn take_next(&mut self, rem_bytes: u32) -> Option<MacCe> {
        if self.con_res.is_some() {
            return None;
        }
        let front = self.queue.front()?;
        if front.required_bytes() > rem_bytes {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.con_res.is_none() && self.queue.is_empty()
    }

    /// Total TB bytes needed to drain the queue, ConRes included
    pub fn pending_bytes(&self) -> u32 {
        let con_res = if self.con_res.is_some() {
            MacCe::ConResId([0; 6]).required_bytes()
        } else {
            0
        };
        con_res + self.queue.iter().map(|ce| ce.required_bytes()).sum::<u32>()
    }

    /// TB bytes needed for the FIFO part only (ConRes excluded)
    pub fn pending_fifo_bytes(&self) -> u32 {
        self.queue.iter().map(|ce| ce.required_bytes()).sum()
    }
}
