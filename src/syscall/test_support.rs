//! Núcleo simulado para os testes: boot sobre RAM em memória e traps de
//! usuário montados à mão na stack do processo corrente.

use crate::arch::x86::context::{Context, CONTEXT_SIZE, VEC_SYSCALL};
use crate::arch::x86::trap::HOST_EXIT_TRAMPOLINE;
use crate::core::kernel::{BootConfig, Kernel};
use crate::drivers::chardev::CharDevice;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::phys::{PhysMemory, RamArena};
use crate::mm::testing::ram_with_map;
use crate::sched::config::{PID_INIT, Q_DEFAULT};
use crate::sched::exec::elf::testing::{build_image, Segment};
use crate::sched::exec::Elf32Loader;
use crate::sched::stack::{Stack, StackManager};
use crate::sched::task::{PcbId, Priority};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// Entry point fictício do init
pub const INIT_ENTRY: u32 = 0x0800_0000;
/// Página de dados de usuário usada pelos testes
pub const USER_DATA: u32 = 0x0900_0000;
/// Onde as imagens ELF de teste são gravadas (abaixo do corte baixo)
pub const IMAGE_AT: u32 = 0x0002_0000;
/// Segmento de texto dos programas de teste
pub const PROGRAM_TEXT: u32 = 0x0A00_0000;

pub type TestKernel = Kernel<RamArena>;

/// Dispositivo com estado compartilhado: o teste guarda um clone e
/// alimenta/inspeciona o que o núcleo recebeu em `Box<dyn CharDevice>`.
#[derive(Clone, Default)]
pub struct CaptureDevice {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl CaptureDevice {
    pub fn feed(&self, data: &[u8]) {
        self.input.lock().extend(data.iter().copied());
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }
}

impl CharDevice for CaptureDevice {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.lock().pop_front()
    }

    fn write(&mut self, data: &[u8]) {
        self.output.lock().extend_from_slice(data);
    }
}

/// Núcleo inicializado com init rodando, mais sondas do console e da
/// serial.
pub fn booted_kernel_with_devices() -> (TestKernel, CaptureDevice, CaptureDevice) {
    let console = CaptureDevice::default();
    let serial = CaptureDevice::default();
    let mut k = Kernel::new(
        ram_with_map(),
        Box::new(console.clone()),
        Box::new(serial.clone()),
        Box::new(Elf32Loader),
    );
    k.init(&BootConfig::new(INIT_ENTRY));
    (k, console, serial)
}

/// Núcleo inicializado com init rodando.
pub fn booted_kernel() -> TestKernel {
    booted_kernel_with_devices().0
}

/// Filho do init já pronto na fila de `prio`, sem passar por fork.
pub fn spawn_ready(k: &mut TestKernel, prio: Priority) -> PcbId {
    let id = k.procs.pcb_alloc().expect("PCB");
    let kernel_space = k.mm.kernel_space().expect("espaço do kernel");
    let space = k.mm.copy_address_space(kernel_space).expect("diretório");
    let stack = k.stacks.stack_alloc(&mut k.mm, Some(space)).expect("stack");
    let args = [b"child".to_vec()];
    let context = StackManager::stack_setup(k.mm.mem_mut(), stack, INIT_ENTRY, &args).expect("setup");

    let pid = k.procs.next_pid();
    let pcb = k.procs.get_mut(id);
    pcb.pid = pid;
    pcb.ppid = PID_INIT;
    pcb.prio = prio;
    pcb.ticks = Q_DEFAULT;
    pcb.context = context;
    pcb.stack = Some(stack);
    pcb.space = Some(space);
    k.procs.insert(id).expect("slot");
    k.schedule(id);
    id
}

/// Simula `int vector` no processo corrente com `eax` e ARG(1..3).
///
/// O frame de argumentos vai logo abaixo do esp de usuário salvo, que não
/// muda entre chamadas (o wrapper desempilha na volta).
pub fn user_trap(k: &mut TestKernel, vector: u32, eax: u32, args: [u32; 3]) -> u32 {
    let curr = k.current().expect("nenhum processo corrente");
    let stack = k.stack_of(curr);
    let saved = k.context_of(curr);
    let user_sp = Stack::offset_of(saved.esp).expect("esp fora da janela");

    let frame = user_sp - 16;
    let mem = k.mm.mem_mut();
    mem.write_u32(stack.phys(frame), HOST_EXIT_TRAMPOLINE);
    for (i, arg) in args.iter().enumerate() {
        mem.write_u32(stack.phys(frame + 4 + i as u32 * 4), *arg);
    }

    let ctx_at = frame - CONTEXT_SIZE;
    let ctx = Context {
        eax,
        vector,
        code: 0,
        esp: saved.esp,
        ..saved
    };
    ctx.store(mem, stack.phys(ctx_at));
    k.trap(Stack::virt(ctx_at).as_u32())
}

/// Syscall do processo corrente; devolve quem chamou.
pub fn syscall(k: &mut TestKernel, num: u32, args: [u32; 3]) -> PcbId {
    let caller = k.current().expect("nenhum processo corrente");
    user_trap(k, VEC_SYSCALL, num, args);
    caller
}

/// `eax` salvo de `id` como código de retorno
pub fn ret_of(k: &TestKernel, id: PcbId) -> i32 {
    k.context_of(id).eax as i32
}

/// Garante a página `USER_DATA` no espaço de `id` e devolve o endereço.
pub fn user_page(k: &mut TestKernel, id: PcbId) -> u32 {
    let space = k.pcb(id).space.expect("espaço");
    if !k.mm.is_mapped(space, VirtAddr::new(USER_DATA)) {
        assert!(k.mm.alloc_page_at(space, VirtAddr::new(USER_DATA)));
    }
    USER_DATA
}

pub fn write_user(k: &mut TestKernel, id: PcbId, addr: u32, data: &[u8]) {
    let space = k.pcb(id).space.expect("espaço");
    k.mm.copy_to_user(space, VirtAddr::new(addr), data).expect("copy_to_user");
}

pub fn read_user(k: &TestKernel, id: PcbId, addr: u32, len: usize) -> Vec<u8> {
    let space = k.pcb(id).space.expect("espaço");
    let mut out = alloc::vec![0u8; len];
    k.mm.copy_from_user(space, VirtAddr::new(addr), &mut out).expect("copy_from_user");
    out
}

pub fn read_user_u32(k: &TestKernel, id: PcbId, addr: u32) -> u32 {
    let space = k.pcb(id).space.expect("espaço");
    k.mm.read_user_u32(space, VirtAddr::new(addr)).expect("read_user_u32")
}

/// Monta um argv (strings + vetor nulo-terminado) na página de dados de
/// `id`, a partir de `USER_DATA + 0x800`.
pub fn write_argv(k: &mut TestKernel, id: PcbId, args: &[&str]) -> u32 {
    let base = user_page(k, id) + 0x800;
    let mut ptrs = Vec::new();
    let mut at = base + 0x100;
    for arg in args {
        let mut bytes = arg.as_bytes().to_vec();
        bytes.push(0);
        write_user(k, id, at, &bytes);
        ptrs.push(at);
        at += bytes.len() as u32;
    }
    ptrs.push(0);
    for (i, p) in ptrs.iter().enumerate() {
        write_user(k, id, base + i as u32 * 4, &p.to_le_bytes());
    }
    base
}

/// Grava em `IMAGE_AT` um programa com texto em `PROGRAM_TEXT` e um bss
/// de uma página; devolve o endereço físico da imagem.
pub fn place_program(k: &mut TestKernel, text: &[u8]) -> u32 {
    let image = build_image(
        PROGRAM_TEXT,
        &[Segment {
            vaddr: PROGRAM_TEXT,
            data: text,
            memsz: text.len() as u32 + 0x1000,
        }],
    );
    k.mm.mem_mut().write_bytes(PhysAddr::new(IMAGE_AT), &image);
    IMAGE_AT
}
