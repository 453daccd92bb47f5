//! Constantes de configuração do Scheduler

/// Entradas da tabela de processos (processos ativos simultâneos)
pub const N_PROCS: usize = 25;

/// Classes de prioridade (0 = mais alta)
pub const N_PRIOS: usize = 3;

/// Quantum padrão (Timeslice) em ticks do clock
pub const Q_DEFAULT: u32 = 5;

/// Frequência do clock (Hz): 1 tick = 1 ms
pub const CLOCK_FREQUENCY: u32 = 1000;

/// PID do processo init (pai adotivo de órfãos)
pub const PID_INIT: u32 = 1;

/// Primeiro PID distribuído depois do init
pub const FIRST_PID: u32 = 2;

/// Bytes de entrada serial guardados sem leitor
pub const SIO_BUFFER_SIZE: usize = 64;

/// Maior argv aceito por execp
pub const MAX_ARGS: usize = 16;

/// Maior string de argumento aceita por execp
pub const MAX_ARG_LEN: usize = 128;

/// Ticks entre dumps de estado do clock (0 desliga)
pub const STATUS_INTERVAL: u32 = 10 * CLOCK_FREQUENCY;

/// Maior sono em ticks: meia volta do contador de tempo
pub const MAX_SLEEP_TICKS: u32 = i32::MAX as u32;

/// Converte milissegundos para ticks (arredonda para cima, mínimo 1).
pub const fn ms_to_ticks(ms: u32) -> u32 {
    let ticks = ((ms as u64 * CLOCK_FREQUENCY as u64 + 999) / 1000) as u32;
    if ticks == 0 && ms != 0 {
        1
    } else {
        ticks
    }
}
