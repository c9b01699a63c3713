use crate::cli::GenotypeArgs;
use crate::strgt::{
    genotype::GenotypeEngine,
    locus::{stream_loci_into_channel, Locus},
    options::Options,
    workflows::{analyze, LocusResult},
    writers::VcfWriter,
};
use crate::utils::{create_writer, inspect_reads, Result};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::bam;
use std::{cell::RefCell, path::PathBuf, thread};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    reads_path: PathBuf,
    options: Options,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
}

fn create_thread_local_bam_reader() -> bam::IndexedReader {
    let path = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .expect("Thread context parameters not initialized for BAM path")
            .reads_path
            .clone()
    });
    bam::IndexedReader::from_path(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to initialize BAM reader for path {}: {}",
            path.display(),
            e
        )
    })
}

fn create_thread_local_engine() -> GenotypeEngine {
    let options = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .expect("Thread context parameters not initialized for engine options")
            .options
            .clone()
    });
    GenotypeEngine::new(options)
        .unwrap_or_else(|e| panic!("Failed to initialize genotyping engine: {}", e))
}

thread_local! {
    static THREAD_BAM_READER: RefCell<bam::IndexedReader> =
        RefCell::new(create_thread_local_bam_reader());
    static THREAD_ENGINE: RefCell<GenotypeEngine> = RefCell::new(create_thread_local_engine());
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

pub fn genotype(args: GenotypeArgs) -> Result<()> {
    let options = Options {
        enclosing_weight: args.class_weights.enclosing,
        spanning_weight: args.class_weights.spanning,
        frr_weight: args.class_weights.frr,
        flanking_weight: args.class_weights.flanking,
        read_len: args.read_len,
        regionsize: args.regionsize,
        min_match: args.min_match,
        dist_mean: args.insert_mean,
        dist_sdev: args.insert_sdev,
        stutter_prob: args.stutter_prob,
        stutter_decay: args.stutter_decay,
        flank_len: args.flank_len,
        num_boot_samp: args.num_bootstraps,
        seed: args.seed,
    };
    options.validate()?;

    let (bam_header, sample_name) = inspect_reads(&args.reads_path, args.sample_name)?;

    let mut vcf_writer = create_writer(&args.output_prefix, "vcf.gz", |path| {
        VcfWriter::new(path, &sample_name, &bam_header)
    })?;

    let haploid_chroms = args.haploid_chroms.unwrap_or_default();
    let flank_len = options.flank_len;
    let (sender_locus, receiver_locus) = bounded(CHANNEL_BUFFER_SIZE);
    let locus_stream_thread = thread::spawn(move || {
        stream_loci_into_channel(
            &args.repeats_path,
            &args.genome_path,
            flank_len,
            &haploid_chroms,
            sender_locus,
        )
    });

    let (sender_result, receiver_result) = bounded(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || {
        for (locus, results) in &receiver_result {
            vcf_writer.write(&locus, &results);
        }
    });

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );
    let pool = initialize_thread_pool(
        args.num_threads,
        ThreadContextParams {
            reads_path: args.reads_path.clone(),
            options,
        },
    )?;
    pool.install(|| {
        receiver_locus
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |s, locus_result| match locus_result {
                Ok(locus) => process_locus(locus, s),
                Err(err) => log::error!("Locus processing: {:#}", err),
            });
    });

    drop(sender_result);
    writer_thread.join().expect("Writer thread panicked");
    log::trace!("Writer thread finished");
    locus_stream_thread
        .join()
        .expect("Locus stream thread panicked");
    log::trace!("Locus stream thread finished");

    Ok(())
}

fn process_locus(locus: Locus, sender_result: &Sender<(Locus, LocusResult)>) {
    THREAD_BAM_READER.with(|reader_cell| {
        THREAD_ENGINE.with(|engine_cell| {
            let mut reader = reader_cell.borrow_mut();
            let mut engine = engine_cell.borrow_mut();
            match analyze(&locus, &mut engine, &mut reader) {
                Ok(results) => {
                    if let Err(e) = sender_result.send((locus, results)) {
                        log::error!("Failed to send locus result to writer thread: {}", e);
                    }
                }
                Err(err) => {
                    log::error!("Error analyzing locus {}: {}", locus.id, err);
                }
            }
        });
    });
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("strgt-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
