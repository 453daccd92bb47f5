//! Ember — Binário Principal.
//!
//! Responsabilidade:
//! 1. Receber do bootstrap (modo protegido, paginação desligada,
//!    interrupções mascaradas) o entry point do init, em `[esp + 4]`.
//! 2. Trocar para a stack de boot.
//! 3. **ZERAR BSS** (o bootstrap não zera).
//! 4. Saltar para `core::entry::kmain` (da biblioteca `ember`).

#![no_std]
#![no_main]

/// Tamanho da stack de boot (até o init entrar)
const BOOT_STACK_SIZE: usize = 16 * 1024;

#[repr(C, align(16))]
struct BootStack([u8; BOOT_STACK_SIZE]);

static mut EMBER_BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

// Símbolos do linker para BSS
extern "C" {
    static __bss_start: u8;
    static __bss_end: u8;
}

core::arch::global_asm!(
    ".section .text._start",
    ".global _start",
    "_start:",
    // 1. Entry do init em ESI (a stack do bootstrap vai embora)
    "    mov esi, dword ptr [esp + 4]",
    // 2. Stack de boot
    "    lea esp, [{stack} + {stack_size}]",
    "    xor ebp, ebp",
    // 3. Zerar BSS: EDI = destino, ECX = contagem, AL = 0
    "    lea edi, [{bss_start}]",
    "    lea ecx, [{bss_end}]",
    "    sub ecx, edi",
    "    xor eax, eax",
    "    cld",
    "    rep stosb",
    // 4. kmain(init_entry)
    "    push esi",
    "    call {kmain}",
    // kmain não retorna
    "2:  cli",
    "    hlt",
    "    jmp 2b",
    stack = sym EMBER_BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    bss_start = sym __bss_start,
    bss_end = sym __bss_end,
    kmain = sym ember::core::entry::kmain,
);
