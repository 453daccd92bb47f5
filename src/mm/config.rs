//! # Configuração do Módulo de Memória
//!
//! Constantes de layout físico/virtual e tamanhos dos alocadores.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: u32 = 4096;

/// Bits de offset dentro de uma página
pub const PAGE_SHIFT: u32 = 12;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: u32 = !(PAGE_SIZE - 1);

/// Tamanho de um slice (1/4 de página)
pub const SLICE_SIZE: u32 = 1024;

/// Slices por página
pub const SLICES_PER_PAGE: u32 = PAGE_SIZE / SLICE_SIZE;

/// Entradas por tabela (diretório ou tabela de páginas)
pub const ENTRIES_PER_TABLE: u32 = 1024;

// =============================================================================
// MAPA DE MEMÓRIA DO BIOS (E820)
// =============================================================================

/// Onde o bootstrap deixa a lista de regiões (contador i32 + registros)
pub const MMAP_ADDRESS: u32 = 0x2D00;

/// Tamanho de cada registro empacotado (base u64, len u64, type u32, acpi u32)
pub const MMAP_RECORD_SIZE: u32 = 24;

/// Tudo abaixo disto pertence ao kernel carregado e às estruturas do BIOS
pub const LOW_MEMORY_CUTOFF: u64 = 0x3F000;

/// Menor região aceita para subir o alocador de frames + paginação
pub const BOOTSTRAP_MIN_PAGES: u32 = 0x40;

/// Capacidade do bitmap de frames (32 MiB de região de bootstrap)
pub const MAX_BITMAP_FRAMES: usize = 8192;

// =============================================================================
// LAYOUT DE MEMÓRIA VIRTUAL
// =============================================================================

/// Páginas baixas mapeadas em identidade no espaço base do kernel
pub const IDENTITY_MAP_PAGES: u32 = 600;

/// Base do espelho "higher half" do kernel
pub const KERNEL_VIRT_BASE: u32 = 0xC000_0000;

/// Primeiro endereço virtual livre para imagens de processo (acima da
/// identidade fixa)
pub const USER_SPACE_BASE: u32 = IDENTITY_MAP_PAGES * PAGE_SIZE;

/// Páginas espelhadas em KERNEL_VIRT_BASE a partir do físico 0
pub const KERNEL_MIRROR_PAGES: u32 = 1024;

/// Janela virtual fixa onde a stack de cada processo é mapeada.
///
/// Todo espaço de endereçamento de processo vê a própria stack neste mesmo
/// endereço, então uma cópia byte a byte da stack continua válida no filho.
pub const STACK_WINDOW_BASE: u32 = 0xDF00_0000;

/// Páginas por stack de processo
pub const STACK_PAGES: u32 = 4;

/// Tamanho da stack em bytes
pub const STACK_SIZE: u32 = STACK_PAGES * PAGE_SIZE;

// =============================================================================
// FUNÇÕES UTILITÁRIAS
// =============================================================================

/// Alinha valor para cima ao múltiplo de align
#[inline(always)]
pub const fn align_up(val: u32, align: u32) -> u32 {
    (val + align - 1) & !(align - 1)
}

/// Alinha valor para baixo ao múltiplo de align
#[inline(always)]
pub const fn align_down(val: u32, align: u32) -> u32 {
    val & !(align - 1)
}

/// Verifica se valor está alinhado
#[inline(always)]
pub const fn is_aligned(val: u32, align: u32) -> bool {
    val & (align - 1) == 0
}

/// Páginas -> bytes
#[inline(always)]
pub const fn pages_to_bytes(pages: u32) -> u32 {
    pages << PAGE_SHIFT
}

/// Bytes -> páginas (arredonda para baixo)
#[inline(always)]
pub const fn bytes_to_pages(bytes: u32) -> u32 {
    bytes >> PAGE_SHIFT
}
