//! Syscalls de processo: exit, fork, execp, kill, wait.
//!
//! # Terminação
//!
//! [`Kernel::perform_exit`] é o caminho único de morte (exit, kill, syscall
//! inválida e recolhimento preguiçoso). Numa só varredura da tabela ele
//! acha o pai e entrega os filhos ao init. O PCB vira `Zombie` e só é
//! liberado quando um pai em `wait` recebe o status.

use crate::core::kernel::Kernel;
use crate::mm::addr::{PhysAddr, VirtAddr};
use crate::mm::phys::PhysMemory;
use crate::mm::AddressSpace;
use crate::sched::config::{MAX_ARGS, MAX_ARG_LEN, N_PROCS, PID_INIT, Q_DEFAULT};
use crate::sched::stack::StackManager;
use crate::sched::task::{Pcb, PcbId, Priority, ProcState};
use crate::syscall::abi::is_user_range;
use crate::syscall::error::{SysError, SysResult};
use alloc::vec::Vec;

impl<M: PhysMemory> Kernel<M> {
    /// Transforma `victim` em zumbi e acorda quem estiver esperando por ele.
    ///
    /// Não despacha: quem chama decide se o corrente mudou.
    pub(crate) fn perform_exit(&mut self, victim: PcbId) {
        let (vpid, vppid) = {
            let pcb = self.procs.get(victim);
            (pcb.pid, pcb.ppid)
        };
        if vpid == PID_INIT {
            crate::kpanic!("(Proc) init terminou, status=", self.procs.get(victim).exit_status);
        }
        self.procs.get_mut(victim).state = ProcState::Zombie;

        // Uma varredura: pai + órfãos
        let mut parent = None;
        let mut orphan_zombie = None;
        for slot in 0..N_PROCS {
            let id = match self.procs.slot(slot) {
                Some(id) if id != victim => id,
                _ => continue,
            };
            let pcb = self.procs.get_mut(id);
            if pcb.pid == vppid {
                parent = Some(id);
            }
            if pcb.ppid == vpid {
                pcb.ppid = PID_INIT;
                if pcb.state == ProcState::Zombie && orphan_zombie.is_none() {
                    orphan_zombie = Some(id);
                }
            }
        }
        let parent = match parent {
            Some(id) => id,
            None => crate::kpanic!("(Proc) pai ausente do pid=", vpid),
        };
        crate::kdebug!("(Proc) exit pid=", vpid, " status=", self.procs.get(victim).exit_status);

        // Órfão que já era zumbi vai direto para um init em wait
        if let (Some(zombie), Some(init)) = (orphan_zombie, self.init) {
            if self.procs.get(init).state == ProcState::Waiting {
                self.wake_waiter(init, zombie);
            }
        }

        if self.procs.get(parent).state == ProcState::Waiting {
            self.wake_waiter(parent, victim);
        }
    }

    /// Entrega `child` a `waiter` bloqueado em wait e o põe na fila.
    fn wake_waiter(&mut self, waiter: PcbId, child: PcbId) {
        let cpid = self.procs.get(child).pid;
        self.set_ret(waiter, cpid);
        self.store_wait_status(waiter, child);
        self.pcb_cleanup(child);
        self.schedule(waiter);
    }

    /// Grava o status de `child` no ponteiro ARG(1) de `waiter`.
    ///
    /// Ponteiro ruim não impede a colheita do filho.
    fn store_wait_status(&mut self, waiter: PcbId, child: PcbId) {
        let ptr = self.arg(waiter, 1);
        if ptr == 0 {
            return;
        }
        let status = self.procs.get(child).exit_status as u32;
        let space = self.procs.get(waiter).space;
        let stored = match space {
            Some(space) if is_user_range(ptr, 4) => {
                self.mm.write_user_u32(space, VirtAddr::new(ptr), status).is_ok()
            }
            _ => false,
        };
        if !stored {
            crate::ktrace!("(Proc) status de wait descartado, ptr=", ptr);
        }
    }

    /// Libera tudo de um processo terminado.
    pub(crate) fn pcb_cleanup(&mut self, id: PcbId) {
        let pcb = *self.procs.get(id);
        if !self.procs.remove(id) {
            crate::kwarn!("(Proc) cleanup de processo fora da tabela pid=", pcb.pid);
        }
        if let Some(stack) = pcb.stack {
            self.stacks.stack_free(self.mm.mem_mut(), stack);
        }
        if let Some(space) = pcb.space {
            self.mm.retire(space);
        }
        self.procs.pcb_free(id);
        crate::ktrace!("(Proc) PCB liberado pid=", pcb.pid);
    }

    /// Lê o vetor argv (ponteiros terminados em nulo) de `space`.
    fn read_argv(&self, space: AddressSpace, argv: u32) -> SysResult<Vec<Vec<u8>>> {
        let mut args = Vec::new();
        if argv == 0 {
            return Ok(args);
        }
        for i in 0..=MAX_ARGS as u32 {
            let slot = argv.checked_add(i * 4).ok_or(SysError::BadParam)?;
            if !is_user_range(slot, 4) {
                return Err(SysError::BadParam);
            }
            let ptr = self.mm.read_user_u32(space, VirtAddr::new(slot))?;
            if ptr == 0 {
                return Ok(args);
            }
            if i as usize == MAX_ARGS || !is_user_range(ptr, 1) {
                return Err(SysError::BadParam);
            }
            args.push(self.mm.read_user_cstr(space, VirtAddr::new(ptr), MAX_ARG_LEN)?);
        }
        Err(SysError::BadParam)
    }

    fn space_of(&self, id: PcbId) -> SysResult<AddressSpace> {
        self.procs.get(id).space.ok_or(SysError::Failure)
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// exit(status)
pub fn sys_exit<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let status = k.arg(curr, 1) as i32;
    k.procs.get_mut(curr).exit_status = status;
    k.perform_exit(curr);
    k.dispatch();
    Ok(None)
}

/// fork(): pid do filho para o pai, 0 para o filho.
///
/// O filho começa com cópia do diretório (mesmos frames) e cópia byte a
/// byte da stack, que fica na mesma janela virtual.
pub fn sys_fork<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    if k.procs.is_full() {
        return Err(SysError::NoProcs);
    }
    let parent = *k.procs.get(curr);
    let (parent_space, parent_stack) = match (parent.space, parent.stack) {
        (Some(space), Some(stack)) => (space, stack),
        _ => return Err(SysError::Failure),
    };
    let child = k.procs.pcb_alloc().ok_or(SysError::NoProcs)?;

    let space = match k.mm.copy_address_space(parent_space) {
        Ok(space) => space,
        Err(e) => {
            crate::kdebug!("(Proc) fork sem diretório, pid=", parent.pid);
            crate::kdebug!(e.as_str());
            k.procs.pcb_free(child);
            return Err(SysError::NoProcs);
        }
    };
    let stack = match k.stacks.stack_alloc(&mut k.mm, Some(space)) {
        Ok(stack) => stack,
        Err(e) => {
            crate::kdebug!("(Proc) fork sem stack, pid=", parent.pid);
            crate::kdebug!(e.as_str());
            k.mm.delete_address_space(space);
            k.procs.pcb_free(child);
            return Err(SysError::NoProcs);
        }
    };
    StackManager::stack_copy(k.mm.mem_mut(), parent_stack, stack);

    let pid = k.procs.next_pid();
    *k.procs.get_mut(child) = Pcb {
        pid,
        ppid: parent.pid,
        state: ProcState::New,
        prio: parent.prio,
        ticks: Q_DEFAULT,
        wakeup: 0,
        exit_status: 0,
        context: parent.context,
        stack: Some(stack),
        space: Some(space),
    };
    if k.procs.insert(child).is_none() {
        k.stacks.stack_free(k.mm.mem_mut(), stack);
        k.mm.delete_address_space(space);
        k.procs.pcb_free(child);
        return Err(SysError::NoProcs);
    }

    k.set_ret(child, 0);
    k.schedule(child);
    crate::kdebug!("(Proc) fork pid=", parent.pid, " filho=", pid);
    Ok(Some(pid))
}

/// execp(imagem, prio, argv): troca a imagem do processo corrente.
///
/// A imagem nova é carregada numa cópia do espaço atual; só depois da
/// carga dar certo a stack é refeita e o espaço trocado. Em erro o
/// chamador continua intacto e recebe `E_FAILURE`.
pub fn sys_execp<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let image = k.arg(curr, 1);
    let prio = Priority::from_u32(k.arg(curr, 2)).ok_or(SysError::BadParam)?;
    let argv = k.arg(curr, 3);
    if image == 0 {
        return Err(SysError::BadParam);
    }

    let old_space = k.space_of(curr)?;
    let args = k.read_argv(old_space, argv)?;
    if !StackManager::args_fit(&args) {
        return Err(SysError::BadParam);
    }

    let new_space = k.mm.copy_address_space(old_space)?;
    let entry = match k.loader.load(&mut k.mm, new_space, PhysAddr::new(image)) {
        Ok(entry) => entry,
        Err(e) => {
            crate::kwarn!("(Proc) execp falhou, imagem=", image);
            crate::kwarn!(e.as_str());
            k.mm.delete_address_space(new_space);
            return Err(SysError::Failure);
        }
    };

    let stack = k.stack_of(curr);
    let context = match StackManager::stack_setup(k.mm.mem_mut(), stack, entry, &args) {
        Ok(off) => off,
        Err(e) => {
            crate::kwarn!("(Proc) execp sem espaço para argv");
            crate::kwarn!(e.as_str());
            k.mm.delete_address_space(new_space);
            return Err(SysError::BadParam);
        }
    };

    let pcb = k.procs.get_mut(curr);
    pcb.space = Some(new_space);
    pcb.context = context;
    pcb.prio = prio;
    let pid = pcb.pid;
    k.mm.retire(old_space);
    crate::kdebug!("(Proc) execp pid=", pid, " entry=", entry, " argc=", args.len());

    k.schedule(curr);
    k.dispatch();
    Ok(None)
}

/// kill(pid). 0 é o próprio chamador; o init não pode ser morto.
pub fn sys_kill<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let target = k.arg(curr, 1);
    let pid = if target == 0 { k.procs.get(curr).pid } else { target };
    if pid == PID_INIT {
        return Err(SysError::BadParam);
    }
    let victim = k.procs.pcb_find(pid).ok_or(SysError::NotFound)?;
    let (state, prio) = {
        let pcb = k.procs.get(victim);
        (pcb.state, pcb.prio)
    };
    crate::kdebug!("(Proc) kill pid=", pid, " estado=", state as u8);

    match state {
        ProcState::Ready | ProcState::Sleeping => {
            let q = if state == ProcState::Ready {
                k.ready_queue(prio)
            } else {
                k.sleep_queue()
            };
            if k.queues.remove_specific(k.mm.mem_mut(), q, victim.as_u32()) != Some(victim.as_u32()) {
                crate::kpanic!("(Proc) vítima ausente da sua fila pid=", pid);
            }
            k.procs.get_mut(victim).exit_status = SysError::Killed.as_i32();
            k.perform_exit(victim);
            Ok(Some(0))
        }
        ProcState::Blocked => {
            // Só quem a bloqueou sabe em que fila está: recolhida ao sair dela
            let pcb = k.procs.get_mut(victim);
            pcb.state = ProcState::Killed;
            pcb.exit_status = SysError::Killed.as_i32();
            Ok(Some(0))
        }
        ProcState::Running => {
            k.procs.get_mut(victim).exit_status = SysError::Killed.as_i32();
            k.perform_exit(victim);
            k.dispatch();
            Ok(None)
        }
        ProcState::Waiting => {
            k.procs.get_mut(victim).exit_status = SysError::Killed.as_i32();
            k.perform_exit(victim);
            Ok(Some(0))
        }
        _ => Err(SysError::NotFound),
    }
}

/// wait(status_ptr): pid de um filho terminado.
pub fn sys_wait<M: PhysMemory>(k: &mut Kernel<M>, curr: PcbId) -> SysResult<Option<u32>> {
    let pid = k.procs.get(curr).pid;
    let mut has_children = false;
    let mut zombie = None;
    for id in k.procs.children(pid) {
        if id == curr {
            continue;
        }
        has_children = true;
        if k.procs.get(id).state == ProcState::Zombie {
            zombie = Some(id);
            break;
        }
    }

    match zombie {
        Some(child) => {
            let cpid = k.procs.get(child).pid;
            k.store_wait_status(curr, child);
            k.pcb_cleanup(child);
            Ok(Some(cpid))
        }
        None if has_children => {
            k.procs.get_mut(curr).state = ProcState::Waiting;
            crate::ktrace!("(Proc) wait bloqueado pid=", pid);
            k.dispatch();
            Ok(None)
        }
        None => Err(SysError::NoChildren),
    }
}

#[cfg(test)]
mod tests {
    use crate::mm::phys::PhysMemory;
    use crate::sched::config::PID_INIT;
    use crate::sched::task::{Priority, ProcState};
    use crate::syscall::error::SysError;
    use crate::syscall::numbers::*;
    use crate::syscall::test_support::*;

    fn fork(k: &mut TestKernel) -> u32 {
        let parent = syscall(k, SYS_FORK, [0; 3]);
        ret_of(k, parent) as u32
    }

    #[test]
    fn fork_returns_child_pid_to_parent_and_zero_to_child() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let pid = fork(&mut k);
        assert!(pid > PID_INIT);

        let child = k.procs().pcb_find(pid).unwrap();
        assert_eq!(k.current(), Some(init));
        assert_eq!(k.pcb(child).ppid, PID_INIT);
        assert_eq!(k.pcb(child).prio, Priority::System);
        assert_eq!(k.pcb(child).state, ProcState::Ready);
        assert_eq!(ret_of(&k, child), 0);

        // Mesma posição na janela, mesmo ponto de retorno
        assert_eq!(k.pcb(child).context, k.pcb(init).context);
        assert_eq!(k.context_of(child).eip, k.context_of(init).eip);
        assert_ne!(k.pcb(child).stack, k.pcb(init).stack);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn wait_without_children_fails_immediately() {
        let mut k = booted_kernel();
        let init = syscall(&mut k, SYS_WAIT, [0; 3]);
        assert_eq!(ret_of(&k, init), SysError::NoChildren.as_i32());
        assert_eq!(k.current(), Some(init));
    }

    #[test]
    fn waiting_parent_is_woken_by_child_exit_with_status() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let status_at = user_page(&mut k, init);
        let pid = fork(&mut k);
        let child = k.procs().pcb_find(pid).unwrap();

        syscall(&mut k, SYS_WAIT, [status_at, 0, 0]);
        assert_eq!(k.pcb(init).state, ProcState::Waiting);
        assert_eq!(k.current(), Some(child));

        syscall(&mut k, SYS_EXIT, [7, 0, 0]);
        assert_eq!(k.current(), Some(init));
        assert_eq!(ret_of(&k, init) as u32, pid);
        assert_eq!(read_user_u32(&k, init, status_at), 7);
        assert!(k.procs().pcb_find(pid).is_none());
        assert_eq!(k.mm().retired_count(), 0);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn exited_child_stays_zombie_until_waited() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let status_at = user_page(&mut k, init);
        let pid = fork(&mut k);
        let child = k.procs().pcb_find(pid).unwrap();

        // cede a vez ao filho (mesma classe)
        syscall(&mut k, SYS_SLEEP, [0; 3]);
        assert_eq!(k.current(), Some(child));
        syscall(&mut k, SYS_EXIT, [3, 0, 0]);
        assert_eq!(k.pcb(child).state, ProcState::Zombie);
        assert_eq!(k.current(), Some(init));

        syscall(&mut k, SYS_WAIT, [status_at, 0, 0]);
        assert_eq!(ret_of(&k, init) as u32, pid);
        assert_eq!(read_user_u32(&k, init, status_at), 3);
        assert!(k.procs().pcb_find(pid).is_none());
    }

    #[test]
    fn orphans_are_adopted_by_init_and_zombie_orphans_delivered() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let status_at = user_page(&mut k, init);

        let a_pid = fork(&mut k);
        let a = k.procs().pcb_find(a_pid).unwrap();
        syscall(&mut k, SYS_WAIT, [status_at, 0, 0]);
        assert_eq!(k.current(), Some(a));

        let b_pid = fork(&mut k);
        let b = k.procs().pcb_find(b_pid).unwrap();
        assert_eq!(k.pcb(b).ppid, a_pid);
        syscall(&mut k, SYS_SLEEP, [0; 3]);
        assert_eq!(k.current(), Some(b));
        syscall(&mut k, SYS_EXIT, [5, 0, 0]);
        assert_eq!(k.pcb(b).state, ProcState::Zombie);
        assert_eq!(k.current(), Some(a));

        // A sai: B (zumbi) passa ao init, que estava esperando
        syscall(&mut k, SYS_EXIT, [1, 0, 0]);
        assert_eq!(k.current(), Some(init));
        assert_eq!(ret_of(&k, init) as u32, b_pid);
        assert_eq!(read_user_u32(&k, init, status_at), 5);
        assert_eq!(k.pcb(a).state, ProcState::Zombie);
        assert_eq!(k.pcb(a).ppid, PID_INIT);

        syscall(&mut k, SYS_WAIT, [status_at, 0, 0]);
        assert_eq!(ret_of(&k, init) as u32, a_pid);
        assert_eq!(read_user_u32(&k, init, status_at), 1);
        assert_eq!(k.procs().count(), 1);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn kill_of_ready_process_unlinks_it_from_its_queue() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let victim = spawn_ready(&mut k, Priority::User);
        let other = spawn_ready(&mut k, Priority::User);
        let pid = k.pcb(victim).pid;
        let before = k.ready_count();

        syscall(&mut k, SYS_KILL, [pid, 0, 0]);
        assert_eq!(ret_of(&k, init), 0);
        assert_eq!(k.ready_count(), before - 1);
        assert_eq!(k.pcb(victim).state, ProcState::Zombie);
        assert_eq!(k.pcb(victim).exit_status, SysError::Killed.as_i32());
        assert_eq!(k.pcb(other).state, ProcState::Ready);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn kill_of_sleeper_leaves_the_sleep_queue() {
        let mut k = booted_kernel();
        let victim = spawn_ready(&mut k, Priority::User);
        let q = k.ready_queue(Priority::User);
        k.queues.remove_specific(k.mm.mem_mut(), q, victim.as_u32()).unwrap();
        k.sleep_until(victim, 100);

        let pid = k.pcb(victim).pid;
        syscall(&mut k, SYS_KILL, [pid, 0, 0]);
        assert_eq!(k.queues().length(k.mm().mem(), k.sleep_queue()), 0);
        assert_eq!(k.pcb(victim).state, ProcState::Zombie);
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn kill_of_blocked_reader_is_lazy() {
        let mut k = booted_kernel();
        let victim = spawn_ready(&mut k, Priority::User);
        let q = k.ready_queue(Priority::User);
        k.queues.remove_specific(k.mm.mem_mut(), q, victim.as_u32()).unwrap();
        let readers = k.readers_queue();
        k.queues.add(&mut k.mm, readers, victim.as_u32(), 0).unwrap();
        k.procs.get_mut(victim).state = ProcState::Blocked;

        let pid = k.pcb(victim).pid;
        syscall(&mut k, SYS_KILL, [pid, 0, 0]);
        assert_eq!(k.pcb(victim).state, ProcState::Killed);

        // O byte acha o leitor morto, recolhe e vai para o buffer
        k.sio_receive(b'x');
        assert_eq!(k.pcb(victim).state, ProcState::Zombie);
        assert_eq!(k.sio.len(), 1);
    }

    #[test]
    fn killing_yourself_dispatches_the_waiting_parent() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let child = spawn_ready(&mut k, Priority::User);
        let pid = k.pcb(child).pid;
        syscall(&mut k, SYS_WAIT, [0; 3]);
        assert_eq!(k.current(), Some(child));

        syscall(&mut k, SYS_KILL, [0; 3]);
        assert_eq!(k.current(), Some(init));
        assert_eq!(ret_of(&k, init) as u32, pid);
        assert!(k.procs().pcb_find(pid).is_none());
    }

    #[test]
    fn init_cannot_be_killed_and_unknown_pids_are_reported() {
        let mut k = booted_kernel();
        let init = syscall(&mut k, SYS_KILL, [PID_INIT, 0, 0]);
        assert_eq!(ret_of(&k, init), SysError::BadParam.as_i32());
        syscall(&mut k, SYS_KILL, [0; 3]);
        assert_eq!(ret_of(&k, init), SysError::BadParam.as_i32());
        syscall(&mut k, SYS_KILL, [99, 0, 0]);
        assert_eq!(ret_of(&k, init), SysError::NotFound.as_i32());
        assert_eq!(k.pcb(init).state, ProcState::Running);
    }

    #[test]
    fn execp_replaces_image_priority_and_arguments() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        let pid = fork(&mut k);
        let child = k.procs().pcb_find(pid).unwrap();
        syscall(&mut k, SYS_WAIT, [0; 3]);
        assert_eq!(k.current(), Some(child));

        let text = b"\x90\x90\xc3";
        let image = place_program(&mut k, text);
        let argv = write_argv(&mut k, child, &["prog", "-v"]);
        syscall(&mut k, SYS_EXECP, [image, Priority::User as u32, argv]);

        assert_eq!(k.current(), Some(child));
        assert_eq!(k.pcb(child).prio, Priority::User);
        assert_eq!(k.context_of(child).eip, PROGRAM_TEXT);
        assert_eq!(read_user(&k, child, PROGRAM_TEXT, text.len()), text.to_vec());
        // bss zerado
        assert_eq!(read_user_u32(&k, child, PROGRAM_TEXT + 0x800), 0);

        let sp = k.context_of(child).esp;
        assert_eq!(read_user_u32(&k, child, sp + 4), 2);
        let argv_out = read_user_u32(&k, child, sp + 8);
        let first = read_user_u32(&k, child, argv_out);
        assert_eq!(read_user(&k, child, first, 5), b"prog\0".to_vec());

        // O espaço antigo foi solto na troca; o do init nunca viu o texto
        assert_eq!(k.mm().retired_count(), 0);
        let init_space = k.pcb(init).space.unwrap();
        assert!(!k.mm().is_mapped(init_space, crate::mm::VirtAddr::new(PROGRAM_TEXT)));
        assert!(k.sched_accounting_ok());
    }

    #[test]
    fn failed_execp_leaves_the_caller_untouched() {
        let mut k = booted_kernel();
        let init = k.current().unwrap();
        k.mm.mem_mut().write_bytes(crate::mm::PhysAddr::new(IMAGE_AT), b"not an elf image");
        let before = k.context_of(init);
        let space = k.pcb(init).space;

        syscall(&mut k, SYS_EXECP, [IMAGE_AT, 0, 0]);
        assert_eq!(ret_of(&k, init), SysError::Failure.as_i32());
        assert_eq!(k.current(), Some(init));
        assert_eq!(k.pcb(init).space, space);
        assert_eq!(k.context_of(init).eip, before.eip);

        syscall(&mut k, SYS_EXECP, [IMAGE_AT, 7, 0]);
        assert_eq!(ret_of(&k, init), SysError::BadParam.as_i32());
    }
}
