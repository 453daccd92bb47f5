//! Contexto salvo em cada trap/interrupção.
//!
//! O stub de entrada empilha, nesta ordem: (CPU) eflags, cs, eip; código de
//! erro (ou 0); vetor; `pushad`; ds, es, fs, gs, ss. O resultado, do
//! endereço mais baixo para o mais alto, é exatamente [`Context`].
//!
//! ```text
//!  ctx + 0   ss gs fs es ds
//!  ctx + 20  edi esi ebp esp ebx edx ecx eax     (pushad)
//!  ctx + 52  vector code
//!  ctx + 60  eip cs eflags                       (iret)
//!  ctx + 72  topo da stack do processo no momento do trap
//! ```

use crate::mm::addr::PhysAddr;
use crate::mm::phys::PhysMemory;
use bitflags::bitflags;

// =============================================================================
// SELETORES (GDT montada pelo boot)
// =============================================================================

pub const GDT_CODE: u32 = 0x10;
pub const GDT_DATA: u32 = 0x18;
pub const GDT_STACK: u32 = 0x20;

// =============================================================================
// VETORES
// =============================================================================

pub const VEC_INVALID_OPCODE: u32 = 0x06;
pub const VEC_GENERAL_PROTECTION: u32 = 0x0D;
pub const VEC_PAGE_FAULT: u32 = 0x0E;
pub const VEC_TIMER: u32 = 0x20;
pub const VEC_SERIAL: u32 = 0x24;
pub const VEC_SYSCALL: u32 = 0x80;

bitflags! {
    /// Bits do EFLAGS que o núcleo manipula
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eflags: u32 {
        const CARRY = 1 << 0;
        /// Sempre 1 no hardware
        const RESERVED_1 = 1 << 1;
        const ZERO = 1 << 6;
        const SIGN = 1 << 7;
        const TRAP = 1 << 8;
        const INTERRUPT = 1 << 9;
        const DIRECTION = 1 << 10;
        const OVERFLOW = 1 << 11;
    }
}

/// EFLAGS de um processo novo: IF ligado (0x202)
pub const DEFAULT_EFLAGS: Eflags = Eflags::RESERVED_1.union(Eflags::INTERRUPT);

/// Palavras no contexto
const CONTEXT_WORDS: usize = 18;

/// Tamanho em bytes do contexto salvo
pub const CONTEXT_SIZE: u32 = (CONTEXT_WORDS * 4) as u32;

/// Offset do `eax` salvo (valor de retorno de syscall)
pub const EAX_OFFSET: u32 = 12 * 4;

/// Registradores salvos por um trap.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub ss: u32,
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

const _: () = assert!(core::mem::size_of::<Context>() == CONTEXT_SIZE as usize);

impl Context {
    /// Contexto inicial: entra em `entry` com segmentos do kernel e IF=1.
    pub fn new_process(entry: u32) -> Self {
        Self {
            ss: GDT_STACK,
            gs: GDT_DATA,
            fs: GDT_DATA,
            es: GDT_DATA,
            ds: GDT_DATA,
            eip: entry,
            cs: GDT_CODE,
            eflags: DEFAULT_EFLAGS.bits(),
            ..Self::default()
        }
    }

    fn to_words(self) -> [u32; CONTEXT_WORDS] {
        [
            self.ss, self.gs, self.fs, self.es, self.ds, self.edi, self.esi, self.ebp, self.esp,
            self.ebx, self.edx, self.ecx, self.eax, self.vector, self.code, self.eip, self.cs,
            self.eflags,
        ]
    }

    fn from_words(w: [u32; CONTEXT_WORDS]) -> Self {
        Self {
            ss: w[0],
            gs: w[1],
            fs: w[2],
            es: w[3],
            ds: w[4],
            edi: w[5],
            esi: w[6],
            ebp: w[7],
            esp: w[8],
            ebx: w[9],
            edx: w[10],
            ecx: w[11],
            eax: w[12],
            vector: w[13],
            code: w[14],
            eip: w[15],
            cs: w[16],
            eflags: w[17],
        }
    }

    /// Lê um contexto da memória física.
    pub fn load<M: PhysMemory>(mem: &M, at: PhysAddr) -> Self {
        let mut words = [0u32; CONTEXT_WORDS];
        for (i, w) in words.iter_mut().enumerate() {
            *w = mem.read_u32(at.add(i as u32 * 4));
        }
        Self::from_words(words)
    }

    /// Grava o contexto na memória física.
    pub fn store<M: PhysMemory>(&self, mem: &mut M, at: PhysAddr) {
        for (i, w) in self.to_words().iter().enumerate() {
            mem.write_u32(at.add(i as u32 * 4), *w);
        }
    }

    pub fn eflags(&self) -> Eflags {
        Eflags::from_bits_retain(self.eflags)
    }

    pub fn dump(&self) {
        crate::kdebug!("(Ctx) eip=", self.eip, " cs=", self.cs, " eflags=", self.eflags);
        crate::kdebug!("(Ctx) eax=", self.eax, " ebx=", self.ebx, " ecx=", self.ecx, " edx=", self.edx);
        crate::kdebug!("(Ctx) esi=", self.esi, " edi=", self.edi, " ebp=", self.ebp, " esp=", self.esp);
        crate::kdebug!("(Ctx) ds=", self.ds, " es=", self.es, " fs=", self.fs, " gs=", self.gs);
        crate::kdebug!("(Ctx) ss=", self.ss, " vector=", self.vector, " code=", self.code);
    }
}
