//! # Estado do Núcleo
//!
//! Um único [`Kernel`] concentra tudo que antes seria global: memória,
//! filas, tabela de processos, stacks, escalonador, clock e serial. Os
//! handlers de interrupção recebem `&mut Kernel`; como há um só núcleo e
//! os handlers rodam até o fim, o acesso é sempre sequencial.
//!
//! ## Caminho de um trap
//!
//! ```text
//!  stub asm ──▶ trap(esp) ──▶ handler do vetor ──▶ resume_esp()
//!   (salva Context             (syscall, clock,       (CR3 do corrente,
//!    na stack do processo)      serial, falha)         esp do contexto)
//! ```
//!
//! `trap` registra onde o contexto do processo corrente ficou; depois do
//! handler, `resume_esp` devolve o contexto de quem estiver corrente, que
//! pode ser outro processo.

use crate::arch::x86::context::{
    Context, VEC_GENERAL_PROTECTION, VEC_INVALID_OPCODE, VEC_PAGE_FAULT,
};
use crate::arch::x86::{cpu, VectorTable};
use crate::core::boot::memory_map::MemoryMap;
use crate::drivers::chardev::CharDevice;
use crate::klib::queue::{wrapping_ascending, QueueEngine};
use crate::mm::addr::PhysAddr;
use crate::mm::config::MMAP_ADDRESS;
use crate::mm::phys::PhysMemory;
use crate::mm::MemoryManager;
use crate::sched::clock::Clock;
use crate::sched::config::{PID_INIT, Q_DEFAULT};
use crate::sched::exec::ProgramLoader;
use crate::sched::scheduler::Scheduler;
use crate::sched::stack::{Stack, StackManager};
use crate::sched::task::{Pcb, PcbId, Priority, ProcessTable};
use crate::syscall::io::SerialInput;
use alloc::boxed::Box;
use alloc::vec;

/// Parâmetros entregues pelo boot
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Onde o bootstrap deixou o mapa E820
    pub memory_map: PhysAddr,
    /// Entry point do processo init
    pub init_entry: u32,
}

impl BootConfig {
    pub const fn new(init_entry: u32) -> Self {
        Self {
            memory_map: PhysAddr::new(MMAP_ADDRESS),
            init_entry,
        }
    }
}

/// Estado completo do núcleo.
pub struct Kernel<M: PhysMemory> {
    pub(crate) mm: MemoryManager<M>,
    pub(crate) queues: QueueEngine,
    pub(crate) procs: ProcessTable,
    pub(crate) stacks: StackManager,
    pub(crate) sched: Scheduler,
    pub(crate) clock: Clock,
    pub(crate) sio: SerialInput,
    pub(crate) vectors: VectorTable<Kernel<M>>,
    /// Canal 0 de read/write
    pub(crate) console: Box<dyn CharDevice>,
    /// Canal 1 de read/write
    pub(crate) serial: Box<dyn CharDevice>,
    pub(crate) loader: Box<dyn ProgramLoader<M>>,
    /// Stack dos handlers (identidade, visível em todo espaço)
    pub(crate) system_stack: Option<Stack>,
    pub(crate) init: Option<PcbId>,
}

impl<M: PhysMemory> Kernel<M> {
    /// Núcleo vazio. Não aloca: em bare-metal o heap global só existe
    /// depois da memória subir em [`Kernel::init`].
    pub fn new(
        mem: M,
        console: Box<dyn CharDevice>,
        serial: Box<dyn CharDevice>,
        loader: Box<dyn ProgramLoader<M>>,
    ) -> Self {
        Self {
            mm: MemoryManager::new(mem),
            queues: QueueEngine::new(),
            procs: ProcessTable::new(),
            stacks: StackManager::new(),
            sched: Scheduler::new(),
            clock: Clock::new(),
            sio: SerialInput::new(),
            vectors: VectorTable::new(),
            console,
            serial,
            loader,
            system_stack: None,
            init: None,
        }
    }

    // =========================================================================
    // BRING-UP
    // =========================================================================

    /// Sobe todos os subsistemas, cria o init e o despacha.
    ///
    /// Qualquer falha aqui é fatal: não existe estado anterior para onde
    /// voltar.
    pub fn init(&mut self, cfg: &BootConfig) {
        crate::kinfo!("(Boot) iniciando núcleo, mapa em ", cfg.memory_map.as_u32());

        // 1. Memória
        let map = MemoryMap::read(self.mm.mem(), cfg.memory_map);
        self.mm.init(&map);
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        crate::mm::allocator::init_heap(&mut self.mm);

        // 2. Filas
        self.clock.order = Some(self.queues.register_order(wrapping_ascending));

        // 3. PCBs
        self.procs.init();

        // 4. Stacks
        self.system_stack_init();

        // 5. Syscalls e exceções
        self.syscall_init();
        self.vectors.install(VEC_INVALID_OPCODE, Self::fault_isr);
        self.vectors.install(VEC_GENERAL_PROTECTION, Self::fault_isr);
        self.vectors.install(VEC_PAGE_FAULT, Self::fault_isr);

        // 6..8
        self.sched_init();
        self.clock_init();
        self.sio_init();

        self.spawn_init(cfg.init_entry);
        crate::kinfo!("(Boot) núcleo pronto, processos=", self.procs.count());
    }

    fn system_stack_init(&mut self) {
        let stack = match self.stacks.stack_alloc(&mut self.mm, None) {
            Ok(stack) => stack,
            Err(e) => crate::kpanic!(e.as_str()),
        };
        self.system_stack = Some(stack);

        #[cfg(all(target_arch = "x86", target_os = "none"))]
        {
            use crate::mm::config::STACK_SIZE;
            let top = stack.base().as_u32() + STACK_SIZE;
            crate::arch::x86::trap::EMBER_SYSTEM_STACK_TOP
                .store(top, ::core::sync::atomic::Ordering::SeqCst);
        }
        crate::kdebug!("(Boot) stack de sistema base=", stack.base().as_u32());
    }

    /// Processo 1: espaço próprio copiado do kernel, argv `["init"]`.
    fn spawn_init(&mut self, entry: u32) {
        let id = match self.procs.pcb_alloc() {
            Some(id) => id,
            None => crate::kpanic!("(Boot) sem PCB para o init"),
        };
        let kernel_space = match self.mm.kernel_space() {
            Some(space) => space,
            None => crate::kpanic!("(Boot) espaço do kernel ausente"),
        };
        let space = match self.mm.copy_address_space(kernel_space) {
            Ok(space) => space,
            Err(e) => crate::kpanic!(e.as_str()),
        };
        let stack = match self.stacks.stack_alloc(&mut self.mm, Some(space)) {
            Ok(stack) => stack,
            Err(e) => crate::kpanic!(e.as_str()),
        };
        let args = vec![b"init".to_vec()];
        let context = match StackManager::stack_setup(self.mm.mem_mut(), stack, entry, &args) {
            Ok(off) => off,
            Err(e) => crate::kpanic!(e.as_str()),
        };

        let pcb = self.procs.get_mut(id);
        pcb.pid = PID_INIT;
        pcb.ppid = PID_INIT;
        pcb.prio = Priority::System;
        pcb.ticks = Q_DEFAULT;
        pcb.context = context;
        pcb.stack = Some(stack);
        pcb.space = Some(space);

        if self.procs.insert(id).is_none() {
            crate::kpanic!("(Boot) tabela de processos cheia no boot");
        }
        self.init = Some(id);
        crate::kinfo!("(Boot) init criado entry=", entry, " ctx=", context);

        self.schedule(id);
        self.dispatch();
    }

    // =========================================================================
    // TRAP
    // =========================================================================

    /// Trata um trap cujo contexto foi salvo em `esp` (janela de stack do
    /// processo corrente). Devolve o `esp` a restaurar.
    ///
    /// O handler roda sob o diretório do kernel: o do processo pode ter
    /// remapeado endereços que o heap usa em identidade. O do processo
    /// volta em `resume_esp`.
    pub fn trap(&mut self, esp: u32) -> u32 {
        let curr = self.current_or_panic();
        let offset = match Stack::offset_of(esp) {
            Some(off) => off,
            None => crate::kpanic!("(Trap) contexto fora da janela de stack esp=", esp),
        };
        self.procs.get_mut(curr).context = offset;
        if let Some(kernel) = self.mm.kernel_space() {
            self.mm.activate(kernel);
        }

        let ctx = self.context_of(curr);
        match self.vectors.get(ctx.vector) {
            Some(handler) => handler(self, ctx.vector, ctx.code),
            None => crate::kpanic!("(Trap) vetor sem handler: ", ctx.vector),
        }
        self.resume_esp()
    }

    /// Ativa o espaço do processo corrente e devolve o endereço do seu
    /// contexto salvo.
    pub fn resume_esp(&mut self) -> u32 {
        let curr = self.current_or_panic();
        let pcb = *self.procs.get(curr);
        if let Some(space) = pcb.space {
            self.mm.activate(space);
        }
        Stack::virt(pcb.context).as_u32()
    }

    /// Exceções de CPU: só diagnóstico.
    fn fault_isr(k: &mut Self, vector: u32, code: u32) {
        let pid = k.current_pcb().map(|p| p.pid).unwrap_or(0);
        crate::kerror!("(Trap) exceção vetor=", vector, " código=", code, " pid=", pid);
        if vector == VEC_PAGE_FAULT {
            crate::kerror!("(Trap) endereço da falha (CR2)=", cpu::read_cr2());
        }
        if let Some(curr) = k.sched.current {
            k.context_of(curr).dump();
        }
        crate::kpanic!("(Trap) exceção fatal vetor=", vector);
    }

    // =========================================================================
    // ACESSO
    // =========================================================================

    pub fn mm(&self) -> &MemoryManager<M> {
        &self.mm
    }

    pub fn mm_mut(&mut self) -> &mut MemoryManager<M> {
        &mut self.mm
    }

    pub fn queues(&self) -> &QueueEngine {
        &self.queues
    }

    pub fn procs(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn stacks(&self) -> &StackManager {
        &self.stacks
    }

    /// Ticks desde o boot
    pub fn time(&self) -> u32 {
        self.clock.time
    }

    pub fn current(&self) -> Option<PcbId> {
        self.sched.current
    }

    pub fn current_pcb(&self) -> Option<&Pcb> {
        self.sched.current.map(|id| self.procs.get(id))
    }

    pub fn init_process(&self) -> Option<PcbId> {
        self.init
    }

    pub fn pcb(&self, id: PcbId) -> &Pcb {
        self.procs.get(id)
    }

    pub(crate) fn current_or_panic(&self) -> PcbId {
        match self.sched.current {
            Some(id) => id,
            None => crate::kpanic!("(Sched) nenhum processo corrente"),
        }
    }

    /// Stack de um processo (todo processo ativo tem uma)
    pub(crate) fn stack_of(&self, id: PcbId) -> Stack {
        match self.procs.get(id).stack {
            Some(stack) => stack,
            None => crate::kpanic!("(Proc) processo sem stack pid=", self.procs.get(id).pid),
        }
    }

    /// Endereço físico do contexto salvo
    pub(crate) fn context_addr(&self, id: PcbId) -> PhysAddr {
        self.stack_of(id).phys(self.procs.get(id).context)
    }

    pub fn context_of(&self, id: PcbId) -> Context {
        Context::load(self.mm.mem(), self.context_addr(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::syscall::test_support::*;

    const VEC_SPARE: u32 = 0x30;

    /// Devolve em eax se o handler viu o diretório do kernel ativo.
    fn report_active_space(k: &mut TestKernel, _vector: u32, _code: u32) {
        let on_kernel = k.mm.active_space() == k.mm.kernel_space();
        let curr = k.current().unwrap();
        k.set_ret(curr, on_kernel as u32);
    }

    #[test]
    fn handlers_run_on_the_kernel_directory_and_return_on_the_process_one() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let space = k.pcb(init).space;
        assert_eq!(k.mm.active_space(), space);

        k.vectors.install(VEC_SPARE, report_active_space);
        user_trap(&mut k, VEC_SPARE, 0, [0; 3]);
        assert_eq!(ret_of(&k, init), 1);
        assert_eq!(k.mm.active_space(), space);
        assert_ne!(space, k.mm.kernel_space());
    }
}
