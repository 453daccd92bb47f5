//! # Motor de Filas
//!
//! Lista duplamente encadeada, opcionalmente ordenada, usada pelas filas de
//! prontos, pela fila de sono e pelos leitores bloqueados da serial.
//!
//! Cabeçalhos e qnodes vivem em células de 16 bytes recortadas de slices
//! do heap (64 células por slice). Células livres ficam numa lista própria
//! e nunca voltam ao alocador de slices.
//!
//! ```text
//!  cabeçalho: [head | tail | count | order]
//!  qnode:     [key  | data | next  | prev ]
//! ```
//!
//! ## Ordenação
//!
//! Sem função de ordem, `add` anexa no fim (FIFO). Com função de ordem,
//! `add` anda a partir da cabeça enquanto `order(nova, do_nó) >= 0` e
//! insere antes do primeiro nó que falha: chaves iguais saem na ordem de
//! chegada.
//!
//! Falta de memória vira `QueueError::OutOfMemory`, nunca panic: filas são
//! manipuladas dentro de handlers de interrupção.

use crate::mm::addr::PhysAddr;
use crate::mm::config::SLICE_SIZE;
use crate::mm::phys::PhysMemory;
use crate::mm::MemoryManager;
use alloc::vec::Vec;

/// Compara a chave nova com a de um nó existente
pub type OrderFn = fn(u32, u32) -> i32;

/// Funções de ordem registráveis
pub const MAX_ORDERS: usize = 4;

const CELL_SIZE: u32 = 16;
const CELLS_PER_SLICE: u32 = SLICE_SIZE / CELL_SIZE;

// Offsets no cabeçalho
const Q_HEAD: u32 = 0;
const Q_TAIL: u32 = 4;
const Q_COUNT: u32 = 8;
const Q_ORDER: u32 = 12;

// Offsets no qnode
const N_KEY: u32 = 0;
const N_DATA: u32 = 4;
const N_NEXT: u32 = 8;
const N_PREV: u32 = 12;

const NULL: PhysAddr = PhysAddr::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Sem slices para novas células
    OutOfMemory,
    /// Remoção de fila vazia
    Empty,
}

impl QueueError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "fila: sem memória",
            Self::Empty => "fila vazia",
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Handle de uma fila (endereço do cabeçalho).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueId(PhysAddr);

/// Handle de uma função de ordem registrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderId(u8);

/// Ordem crescente de chave
pub fn ascending(new_key: u32, node_key: u32) -> i32 {
    new_key.cmp(&node_key) as i32
}

/// Ordem crescente de instantes de um contador que dá a volta. Só vale
/// enquanto todas as chaves da fila cabem numa janela de 2^31.
pub fn wrapping_ascending(new_key: u32, node_key: u32) -> i32 {
    (new_key.wrapping_sub(node_key) as i32).signum()
}

/// Dono das células livres e do registro de funções de ordem.
pub struct QueueEngine {
    free: PhysAddr,
    free_cells: u32,
    orders: [Option<OrderFn>; MAX_ORDERS],
    live: u32,
}

impl Default for QueueEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueEngine {
    pub const fn new() -> Self {
        Self {
            free: NULL,
            free_cells: 0,
            orders: [None; MAX_ORDERS],
            live: 0,
        }
    }

    /// Filas criadas e ainda não destruídas
    pub fn live_queues(&self) -> u32 {
        self.live
    }

    pub fn free_cells(&self) -> u32 {
        self.free_cells
    }

    /// Registra uma função de ordem. Só no boot: registro cheio é fatal.
    pub fn register_order(&mut self, order: OrderFn) -> OrderId {
        for (i, slot) in self.orders.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(order);
                return OrderId(i as u8);
            }
        }
        crate::kpanic!("(Queue) registro de ordens cheio")
    }

    // =========================================================================
    // CÉLULAS
    // =========================================================================

    fn cell<M: PhysMemory>(&mut self, mm: &mut MemoryManager<M>) -> QueueResult<PhysAddr> {
        if self.free.is_null() {
            let slice = mm.try_slice_alloc().map_err(|_| {
                crate::kwarn!("(Queue) sem slices para células");
                QueueError::OutOfMemory
            })?;
            for i in (0..CELLS_PER_SLICE).rev() {
                self.release_cell(mm.mem_mut(), slice.add(i * CELL_SIZE));
            }
        }
        let cell = self.free;
        let mem = mm.mem_mut();
        self.free = PhysAddr::new(mem.read_u32(cell));
        self.free_cells -= 1;
        mem.fill(cell, 0, CELL_SIZE);
        Ok(cell)
    }

    fn release_cell<M: PhysMemory>(&mut self, mem: &mut M, cell: PhysAddr) {
        mem.write_u32(cell, self.free.as_u32());
        self.free = cell;
        self.free_cells += 1;
    }

    // =========================================================================
    // CAMPOS
    // =========================================================================

    fn get<M: PhysMemory>(mem: &M, at: PhysAddr, field: u32) -> u32 {
        mem.read_u32(at.add(field))
    }

    fn link<M: PhysMemory>(mem: &M, at: PhysAddr, field: u32) -> PhysAddr {
        PhysAddr::new(mem.read_u32(at.add(field)))
    }

    fn set<M: PhysMemory>(mem: &mut M, at: PhysAddr, field: u32, value: u32) {
        mem.write_u32(at.add(field), value);
    }

    fn order_of<M: PhysMemory>(&self, mem: &M, q: QueueId) -> Option<OrderFn> {
        match Self::get(mem, q.0, Q_ORDER) {
            0 => None,
            n => self.orders.get(n as usize - 1).copied().flatten(),
        }
    }

    // =========================================================================
    // OPERAÇÕES
    // =========================================================================

    /// Fila vazia, FIFO ou ordenada por `order`.
    pub fn create<M: PhysMemory>(
        &mut self,
        mm: &mut MemoryManager<M>,
        order: Option<OrderId>,
    ) -> QueueResult<QueueId> {
        let header = self.cell(mm)?;
        if let Some(OrderId(i)) = order {
            Self::set(mm.mem_mut(), header, Q_ORDER, i as u32 + 1);
        }
        self.live += 1;
        crate::ktrace!("(Queue) criada em ", header.as_u32());
        Ok(QueueId(header))
    }

    /// Solta todos os qnodes e o cabeçalho.
    pub fn delete<M: PhysMemory>(&mut self, mem: &mut M, q: QueueId) {
        let mut node = Self::link(mem, q.0, Q_HEAD);
        while !node.is_null() {
            let next = Self::link(mem, node, N_NEXT);
            self.release_cell(mem, node);
            node = next;
        }
        self.release_cell(mem, q.0);
        self.live -= 1;
    }

    pub fn length<M: PhysMemory>(&self, mem: &M, q: QueueId) -> u32 {
        Self::get(mem, q.0, Q_COUNT)
    }

    pub fn is_empty<M: PhysMemory>(&self, mem: &M, q: QueueId) -> bool {
        self.length(mem, q) == 0
    }

    /// Insere `data` com `key` (posição conforme a ordem da fila).
    pub fn add<M: PhysMemory>(
        &mut self,
        mm: &mut MemoryManager<M>,
        q: QueueId,
        data: u32,
        key: u32,
    ) -> QueueResult<()> {
        let node = self.cell(mm)?;
        let order = self.order_of(mm.mem(), q);
        let mem = mm.mem_mut();
        Self::set(mem, node, N_KEY, key);
        Self::set(mem, node, N_DATA, data);

        // Nó antes do qual inserir (NULL = no fim)
        let mut before = NULL;
        if let Some(order) = order {
            let mut curr = Self::link(mem, q.0, Q_HEAD);
            while !curr.is_null() {
                if order(key, Self::get(mem, curr, N_KEY)) < 0 {
                    before = curr;
                    break;
                }
                curr = Self::link(mem, curr, N_NEXT);
            }
        }

        if before.is_null() {
            let tail = Self::link(mem, q.0, Q_TAIL);
            Self::set(mem, node, N_PREV, tail.as_u32());
            if tail.is_null() {
                Self::set(mem, q.0, Q_HEAD, node.as_u32());
            } else {
                Self::set(mem, tail, N_NEXT, node.as_u32());
            }
            Self::set(mem, q.0, Q_TAIL, node.as_u32());
        } else {
            let prev = Self::link(mem, before, N_PREV);
            Self::set(mem, node, N_NEXT, before.as_u32());
            Self::set(mem, node, N_PREV, prev.as_u32());
            Self::set(mem, before, N_PREV, node.as_u32());
            if prev.is_null() {
                Self::set(mem, q.0, Q_HEAD, node.as_u32());
            } else {
                Self::set(mem, prev, N_NEXT, node.as_u32());
            }
        }

        let count = Self::get(mem, q.0, Q_COUNT);
        Self::set(mem, q.0, Q_COUNT, count + 1);
        Ok(())
    }

    fn unlink<M: PhysMemory>(&mut self, mem: &mut M, q: QueueId, node: PhysAddr) -> u32 {
        let prev = Self::link(mem, node, N_PREV);
        let next = Self::link(mem, node, N_NEXT);
        if prev.is_null() {
            Self::set(mem, q.0, Q_HEAD, next.as_u32());
        } else {
            Self::set(mem, prev, N_NEXT, next.as_u32());
        }
        if next.is_null() {
            Self::set(mem, q.0, Q_TAIL, prev.as_u32());
        } else {
            Self::set(mem, next, N_PREV, prev.as_u32());
        }

        let count = Self::get(mem, q.0, Q_COUNT);
        crate::kassert!(0, count > 0, "(Queue) contador zerado com nós ligados");
        Self::set(mem, q.0, Q_COUNT, count - 1);

        let data = Self::get(mem, node, N_DATA);
        self.release_cell(mem, node);
        data
    }

    /// Remove da frente.
    pub fn remove<M: PhysMemory>(&mut self, mem: &mut M, q: QueueId) -> QueueResult<u32> {
        let head = Self::link(mem, q.0, Q_HEAD);
        if head.is_null() {
            return Err(QueueError::Empty);
        }
        Ok(self.unlink(mem, q, head))
    }

    /// Remove o primeiro nó cujo dado é `data`.
    pub fn remove_specific<M: PhysMemory>(
        &mut self,
        mem: &mut M,
        q: QueueId,
        data: u32,
    ) -> Option<u32> {
        let mut node = Self::link(mem, q.0, Q_HEAD);
        while !node.is_null() {
            if Self::get(mem, node, N_DATA) == data {
                return Some(self.unlink(mem, q, node));
            }
            node = Self::link(mem, node, N_NEXT);
        }
        None
    }

    /// Dado da frente, sem remover
    pub fn peek<M: PhysMemory>(&self, mem: &M, q: QueueId) -> Option<u32> {
        let head = Self::link(mem, q.0, Q_HEAD);
        if head.is_null() {
            None
        } else {
            Some(Self::get(mem, head, N_DATA))
        }
    }

    /// Chave da frente, ou 0 com a fila vazia
    pub fn peek_key<M: PhysMemory>(&self, mem: &M, q: QueueId) -> u32 {
        let head = Self::link(mem, q.0, Q_HEAD);
        if head.is_null() {
            0
        } else {
            Self::get(mem, head, N_KEY)
        }
    }

    /// `true` se `data` está na fila
    pub fn contains<M: PhysMemory>(&self, mem: &M, q: QueueId, data: u32) -> bool {
        self.entries(mem, q).iter().any(|&(_, d)| d == data)
    }

    /// Pares (key, data) da frente para o fim.
    pub fn entries<M: PhysMemory>(&self, mem: &M, q: QueueId) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        let mut node = Self::link(mem, q.0, Q_HEAD);
        while !node.is_null() {
            out.push((Self::get(mem, node, N_KEY), Self::get(mem, node, N_DATA)));
            node = Self::link(mem, node, N_NEXT);
        }
        out
    }

    /// Contador, ligações de volta e ordem das chaves conferem.
    pub fn is_consistent<M: PhysMemory>(&self, mem: &M, q: QueueId) -> bool {
        let order = self.order_of(mem, q);
        let mut prev = NULL;
        let mut node = Self::link(mem, q.0, Q_HEAD);
        let mut seen = 0u32;
        while !node.is_null() {
            if Self::link(mem, node, N_PREV) != prev {
                return false;
            }
            if let Some(order) = order {
                if !prev.is_null()
                    && order(Self::get(mem, node, N_KEY), Self::get(mem, prev, N_KEY)) < 0
                {
                    return false;
                }
            }
            seen += 1;
            prev = node;
            node = Self::link(mem, node, N_NEXT);
        }
        prev == Self::link(mem, q.0, Q_TAIL) && seen == Self::get(mem, q.0, Q_COUNT)
    }

    pub fn dump<M: PhysMemory>(&self, mem: &M, q: QueueId) {
        crate::kdebug!("(Queue) fila ", q.0.as_u32(), " count=", self.length(mem, q));
        for (key, data) in self.entries(mem, q) {
            crate::kdebug!("(Queue)   key=", key, " data=", data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::testing::memory_manager;

    #[test]
    fn unordered_queue_is_fifo() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let q = qe.create(&mut mm, None).unwrap();

        for (data, key) in [(1, 30), (2, 10), (3, 20)] {
            qe.add(&mut mm, q, data, key).unwrap();
        }
        assert_eq!(qe.length(mm.mem(), q), 3);
        assert_eq!(qe.peek(mm.mem(), q), Some(1));
        assert_eq!(qe.peek_key(mm.mem(), q), 30);

        let out: Vec<u32> = (0..3).map(|_| qe.remove(mm.mem_mut(), q).unwrap()).collect();
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(qe.remove(mm.mem_mut(), q), Err(QueueError::Empty));
        assert_eq!(qe.peek_key(mm.mem(), q), 0);
    }

    #[test]
    fn ordered_queue_breaks_ties_by_arrival() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let asc = qe.register_order(ascending);
        let q = qe.create(&mut mm, Some(asc)).unwrap();

        for (data, key) in [(1, 50), (2, 20), (3, 50), (4, 10), (5, 20)] {
            qe.add(&mut mm, q, data, key).unwrap();
        }
        assert!(qe.is_consistent(mm.mem(), q));
        assert_eq!(
            qe.entries(mm.mem(), q),
            [(10, 4), (20, 2), (20, 5), (50, 1), (50, 3)]
        );
    }

    #[test]
    fn wrapping_order_keeps_deadlines_across_the_wrap_sorted() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let order = qe.register_order(wrapping_ascending);
        let q = qe.create(&mut mm, Some(order)).unwrap();

        for (data, key) in [(1, 2), (2, u32::MAX), (3, 0), (4, u32::MAX - 3), (5, 0)] {
            qe.add(&mut mm, q, data, key).unwrap();
        }
        assert!(qe.is_consistent(mm.mem(), q));
        assert_eq!(
            qe.entries(mm.mem(), q),
            [(u32::MAX - 3, 4), (u32::MAX, 2), (0, 3), (0, 5), (2, 1)]
        );
    }

    #[test]
    fn remove_specific_relinks_neighbours() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let q = qe.create(&mut mm, None).unwrap();
        for d in 1..=4 {
            qe.add(&mut mm, q, d, 0).unwrap();
        }

        assert_eq!(qe.remove_specific(mm.mem_mut(), q, 3), Some(3));
        assert_eq!(qe.remove_specific(mm.mem_mut(), q, 3), None);
        assert_eq!(qe.remove_specific(mm.mem_mut(), q, 1), Some(1));
        assert_eq!(qe.remove_specific(mm.mem_mut(), q, 4), Some(4));
        assert!(qe.is_consistent(mm.mem(), q));
        assert_eq!(qe.entries(mm.mem(), q), [(0, 2)]);
    }

    #[test]
    fn cells_are_recycled_through_the_free_list() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let q = qe.create(&mut mm, None).unwrap();
        let carved = mm.slice_allocator().pages_carved();

        for round in 0..10 {
            for d in 0..100 {
                qe.add(&mut mm, q, d, round).unwrap();
            }
            while qe.remove(mm.mem_mut(), q).is_ok() {}
        }
        // 101 células no pico: 2 slices, mesma página
        assert_eq!(mm.slice_allocator().pages_carved(), carved);

        qe.delete(mm.mem_mut(), q);
        assert_eq!(qe.live_queues(), 0);
    }

    #[test]
    fn random_ordered_sequences_stay_sorted_and_stable() {
        let mut mm = memory_manager();
        let mut qe = QueueEngine::new();
        let asc = qe.register_order(ascending);
        let q = qe.create(&mut mm, Some(asc)).unwrap();

        let mut seed = 0x1234_5678u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        let mut seq = 0u32;
        let mut last: Option<(u32, u32)> = None;
        for _ in 0..500 {
            if next() % 3 != 0 {
                qe.add(&mut mm, q, seq, next() % 8).unwrap();
                seq += 1;
            } else {
                let _ = qe.remove(mm.mem_mut(), q);
            }
            assert!(qe.is_consistent(mm.mem(), q));
        }

        // Drena: chave não decresce e, entre iguais, a sequência cresce
        while let Some(data) = qe.peek(mm.mem(), q) {
            let key = qe.peek_key(mm.mem(), q);
            qe.remove(mm.mem_mut(), q).unwrap();
            if let Some((k, d)) = last {
                assert!(key > k || (key == k && data > d));
            }
            last = Some((key, data));
        }
    }
}
