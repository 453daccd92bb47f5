//! Stacks de processo.
//!
//! Cada stack ocupa `STACK_PAGES` páginas contíguas do heap e aparece, em
//! todo espaço de processo, na mesma janela virtual `STACK_WINDOW_BASE`.
//! O kernel escreve nela pelo endereço físico; o processo a enxerga pela
//! janela. Por isso o contexto salvo é guardado como offset dentro da
//! stack, e uma cópia byte a byte (fork) já é válida no filho.
//!
//! Stacks liberadas vão para uma lista própria (primeira palavra = link) e
//! nunca voltam ao alocador de páginas.
//!
//! ## Layout montado por `stack_setup` (endereços crescem para baixo)
//!
//! ```text
//!  topo - 4   ponteiro para argv          <- última palavra
//!             strings dos argumentos
//!             argv[0..argc], NULL
//!             argv                         (alinhado: argc em múltiplo de 16)
//!             argc
//!             retorno -> trampolim de exit
//!  context -> Context inicial (eip = entry)
//! ```

use crate::arch::x86::context::{Context, CONTEXT_SIZE};
use crate::arch::x86::trap::exit_trampoline;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::config::{align_up, PAGE_SIZE, STACK_PAGES, STACK_SIZE, STACK_WINDOW_BASE};
use crate::mm::error::{MmError, MmResult};
use crate::mm::phys::PhysMemory;
use crate::mm::{AddressSpace, MemoryManager};
use alloc::vec::Vec;

/// Uma stack (endereço físico da página mais baixa).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stack {
    base: PhysAddr,
}

impl Stack {
    pub fn base(self) -> PhysAddr {
        self.base
    }

    /// Endereço físico de um offset
    pub fn phys(self, offset: u32) -> PhysAddr {
        self.base.add(offset)
    }

    /// Endereço na janela (visão do processo)
    pub const fn virt(offset: u32) -> VirtAddr {
        VirtAddr::new(STACK_WINDOW_BASE + offset)
    }

    /// Offset de um endereço da janela, se cair dentro da stack
    pub fn offset_of(virt: u32) -> Option<u32> {
        let off = virt.checked_sub(STACK_WINDOW_BASE)?;
        if off < STACK_SIZE {
            Some(off)
        } else {
            None
        }
    }
}

pub struct StackManager {
    free: PhysAddr,
    free_count: u32,
    in_use: u32,
}

impl Default for StackManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StackManager {
    pub const fn new() -> Self {
        Self {
            free: PhysAddr::new(0),
            free_count: 0,
            in_use: 0,
        }
    }

    pub fn free_stacks(&self) -> u32 {
        self.free_count
    }

    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// Stack zerada; com `space`, já mapeada na janela desse espaço.
    pub fn stack_alloc<M: PhysMemory>(
        &mut self,
        mm: &mut MemoryManager<M>,
        space: Option<AddressSpace>,
    ) -> MmResult<Stack> {
        let base = if self.free.is_null() {
            mm.page_alloc(STACK_PAGES).ok_or(MmError::OutOfMemory)?
        } else {
            let base = self.free;
            self.free = PhysAddr::new(mm.mem().read_u32(base));
            self.free_count -= 1;
            base
        };
        mm.mem_mut().fill(base, 0, STACK_SIZE);
        let stack = Stack { base };

        if let Some(space) = space {
            if let Err(e) = Self::map_into(mm, space, stack) {
                self.push(mm.mem_mut(), stack);
                return Err(e);
            }
        }

        self.in_use += 1;
        crate::ktrace!("(Stack) alocada base=", base.as_u32());
        Ok(stack)
    }

    /// Mapeia a stack na janela de `space` (substitui o que estiver lá).
    pub fn map_into<M: PhysMemory>(
        mm: &mut MemoryManager<M>,
        space: AddressSpace,
        stack: Stack,
    ) -> MmResult<()> {
        for i in 0..STACK_PAGES {
            let off = i * PAGE_SIZE;
            mm.map(space, Stack::virt(off), stack.base.add(off))?;
        }
        Ok(())
    }

    pub fn stack_free<M: PhysMemory>(&mut self, mem: &mut M, stack: Stack) {
        crate::kassert!(1, self.in_use > 0, "(Stack) free sem stacks em uso");
        self.in_use -= 1;
        self.push(mem, stack);
        crate::ktrace!("(Stack) liberada base=", stack.base.as_u32());
    }

    fn push<M: PhysMemory>(&mut self, mem: &mut M, stack: Stack) {
        mem.write_u32(stack.base, self.free.as_u32());
        self.free = stack.base;
        self.free_count += 1;
    }

    /// Copia a imagem inteira de `from` para `to`.
    pub fn stack_copy<M: PhysMemory>(mem: &mut M, from: Stack, to: Stack) {
        mem.copy(from.base, to.base, STACK_SIZE);
    }

    /// Bytes das strings de argumento (com NUL, alinhado a 4)
    fn arg_bytes(args: &[Vec<u8>]) -> u32 {
        align_up(args.iter().map(|a| a.len() as u32 + 1).sum::<u32>(), 4)
    }

    /// Os argumentos cabem na metade de cima de uma stack?
    pub fn args_fit(args: &[Vec<u8>]) -> bool {
        let argc = args.len() as u32;
        // strings + ponteiros + argc/argv + retorno + contexto
        let needed = Self::arg_bytes(args) + (argc + 4) * 4 + 16 + CONTEXT_SIZE;
        needed <= STACK_SIZE / 2
    }

    /// Monta argv, retorno falso e contexto inicial. Devolve o offset do
    /// contexto.
    pub fn stack_setup<M: PhysMemory>(
        mem: &mut M,
        stack: Stack,
        entry: u32,
        args: &[Vec<u8>],
    ) -> MmResult<u32> {
        let argc = args.len() as u32;
        let argbytes = Self::arg_bytes(args);
        if !Self::args_fit(args) {
            crate::kwarn!("(Stack) argumentos grandes demais, bytes=", argbytes);
            return Err(MmError::InvalidParameter);
        }

        mem.fill(stack.base, 0, STACK_SIZE);

        // Última palavra da stack
        let last = STACK_SIZE - 4;

        // Strings logo abaixo dela
        let strings = last - argbytes;
        let mut string_offsets = Vec::with_capacity(args.len());
        let mut at = strings;
        for arg in args {
            mem.write_bytes(stack.phys(at), arg);
            mem.write_bytes(stack.phys(at + arg.len() as u32), &[0]);
            string_offsets.push(at);
            at += arg.len() as u32 + 1;
        }

        // argc precisa cair em múltiplo de 16 (visto pela janela)
        let argc_at = (strings - (argc + 3) * 4) & !0xF;
        let argv_at = argc_at + 8;

        mem.write_u32(stack.phys(argc_at), argc);
        let argv_virt = Stack::virt(argv_at).as_u32();
        mem.write_u32(stack.phys(argc_at + 4), argv_virt);
        mem.write_u32(stack.phys(last), argv_virt);
        for (i, off) in string_offsets.iter().enumerate() {
            mem.write_u32(stack.phys(argv_at + i as u32 * 4), Stack::virt(*off).as_u32());
        }
        mem.write_u32(stack.phys(argv_at + argc * 4), 0);

        // Retorno falso: main() "volta" para o trampolim de exit
        let ret_at = argc_at - 4;
        mem.write_u32(stack.phys(ret_at), exit_trampoline());

        let ctx_at = ret_at - CONTEXT_SIZE;
        let mut ctx = Context::new_process(entry);
        ctx.esp = Stack::virt(ret_at).as_u32();
        ctx.ebp = 0;
        ctx.store(mem, stack.phys(ctx_at));

        crate::ktrace!("(Stack) setup entry=", entry, " argc=", argc, " ctx=", ctx_at);
        Ok(ctx_at)
    }
}
